//! In-memory payload store.

use crate::errors::StorageError;
use crate::storage::PayloadStore;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Payload store backed by a process-local map.
///
/// Useful in tests and for deployments where offloaded payloads do not
/// need to outlive the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl PayloadStore for MemoryStore {
    fn store_id(&self) -> &str {
        "memory"
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { key: key.to_string() })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.read().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put("k1", Bytes::from("payload"), None).await.unwrap();
        assert!(store.exists("k1").await.unwrap());
        assert_eq!(store.get("k1").await.unwrap(), Bytes::from("payload"));

        store.delete("k1").await.unwrap();
        assert!(!store.exists("k1").await.unwrap());
        assert!(matches!(
            store.get("k1").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_is_idempotent() {
        let store = MemoryStore::new();
        store.put("k", Bytes::from("x"), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), store.get("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.delete("absent").await.is_ok());
    }
}
