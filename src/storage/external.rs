//! Offload policy over a payload store.

use crate::errors::StorageError;
use crate::storage::PayloadStore;
use crate::types::Payload;
use bytes::Bytes;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Decides when a body leaves process memory for a [`PayloadStore`] and
/// resolves stored references back to bytes.
///
/// With no store configured, every body stays inline and `maybe_offload`
/// is a pass-through.
#[derive(Clone)]
pub struct ExternalStorage {
    store: Option<Arc<dyn PayloadStore>>,
    threshold: u64,
}

impl ExternalStorage {
    /// Offload bodies larger than `threshold` bytes into `store`.
    pub fn new(store: Arc<dyn PayloadStore>, threshold: u64) -> Self {
        Self {
            store: Some(store),
            threshold,
        }
    }

    /// Keep every body inline.
    pub fn disabled() -> Self {
        Self {
            store: None,
            threshold: u64::MAX,
        }
    }

    /// Whether a store is configured.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Park `bytes` in the store when they exceed the threshold, returning
    /// a `Stored` reference; otherwise return them inline.
    ///
    /// A failed `put` falls back to inline so the task can still proceed;
    /// the failure is logged.
    pub async fn maybe_offload(&self, bytes: Bytes, content_type: Option<&str>) -> Payload {
        let store = match &self.store {
            Some(store) if bytes.len() as u64 > self.threshold => store,
            _ => return Payload::inline(bytes),
        };

        let key = Uuid::new_v4().to_string();
        let size = bytes.len() as u64;
        match store.put(&key, bytes.clone(), content_type).await {
            Ok(()) => Payload::Stored {
                store_id: store.store_id().to_string(),
                key,
                size,
                content_type: content_type.map(str::to_string),
            },
            Err(e) => {
                warn!(key = %key, error = %e, "payload offload failed, keeping body inline");
                Payload::inline(bytes)
            }
        }
    }

    /// Resolve a payload to bytes, fetching `Stored` references from the
    /// store. Idempotent.
    pub async fn materialize(&self, payload: &Payload) -> Result<Bytes, StorageError> {
        match payload {
            Payload::Inline { bytes } => Ok(bytes.clone()),
            Payload::Stored { store_id, key, .. } => {
                let store = self.store.as_ref().ok_or_else(|| StorageError::Backend {
                    message: format!("no payload store configured to resolve {store_id}:{key}"),
                })?;
                store.get(key).await
            }
        }
    }

    /// Best-effort delete of a stored payload. Failures are logged, never
    /// fatal; inline payloads are ignored.
    pub async fn discard(&self, payload: &Payload) {
        if let (Payload::Stored { key, .. }, Some(store)) = (payload, &self.store) {
            if let Err(e) = store.delete(key).await {
                warn!(key = %key, error = %e, "payload delete failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn storage_with_threshold(threshold: u64) -> (ExternalStorage, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ExternalStorage::new(store.clone(), threshold), store)
    }

    #[tokio::test]
    async fn test_small_body_stays_inline() {
        let (storage, store) = storage_with_threshold(1024);
        let payload = storage.maybe_offload(Bytes::from("small"), None).await;
        assert!(payload.is_inline());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_large_body_is_offloaded_and_materializes() {
        let (storage, store) = storage_with_threshold(8);
        let body = Bytes::from(vec![7u8; 64]);
        let payload = storage.maybe_offload(body.clone(), Some("application/octet-stream")).await;

        match &payload {
            Payload::Stored { store_id, size, content_type, .. } => {
                assert_eq!(store_id, "memory");
                assert_eq!(*size, 64);
                assert_eq!(content_type.as_deref(), Some("application/octet-stream"));
            }
            Payload::Inline { .. } => panic!("expected offloaded payload"),
        }
        assert_eq!(store.len(), 1);

        let bytes = storage.materialize(&payload).await.unwrap();
        assert_eq!(bytes, body);
        // Resolution does not consume the entry.
        assert_eq!(storage.materialize(&payload).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_discard_removes_stored_entry() {
        let (storage, store) = storage_with_threshold(0);
        let payload = storage.maybe_offload(Bytes::from("gone soon"), None).await;
        assert_eq!(store.len(), 1);

        storage.discard(&payload).await;
        assert!(store.is_empty());
        // Discarding again is harmless.
        storage.discard(&payload).await;
    }

    #[tokio::test]
    async fn test_disabled_storage_passes_through() {
        let storage = ExternalStorage::disabled();
        let payload = storage.maybe_offload(Bytes::from(vec![0u8; 1 << 20]), None).await;
        assert!(payload.is_inline());

        let stored = Payload::Stored {
            store_id: "memory".to_string(),
            key: "k".to_string(),
            size: 1,
            content_type: None,
        };
        assert!(storage.materialize(&stored).await.is_err());
    }
}
