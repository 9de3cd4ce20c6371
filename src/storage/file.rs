//! Filesystem-backed payload store.

use crate::errors::StorageError;
use crate::storage::PayloadStore;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Payload store writing one file per key under a root directory.
///
/// Keys are opaque UUID strings generated by the engine, so they are used
/// directly as file names. Content types are kept in an in-memory index
/// rather than sidecar files, so they live only as long as the store value
/// does. Durability is whatever the filesystem provides; the engine only
/// assumes the capability set.
pub struct FileStore {
    root: PathBuf,
    index: RwLock<HashMap<String, Option<String>>>,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            index: RwLock::new(HashMap::new()),
        })
    }

    /// Content type recorded when `key` was put, if any.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.index.read().get(key).cloned().flatten()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl PayloadStore for FileStore {
    fn store_id(&self) -> &str {
        "file"
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        tokio::fs::write(self.path_for(key), &bytes).await?;
        self.index
            .write()
            .insert(key.to_string(), content_type.map(str::to_string));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound { key: key.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.index.write().remove(key);
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.put("key-1", Bytes::from("on disk"), Some("text/plain")).await.unwrap();
        assert!(store.exists("key-1").await.unwrap());
        assert_eq!(store.get("key-1").await.unwrap(), Bytes::from("on disk"));

        store.delete("key-1").await.unwrap();
        assert!(!store.exists("key-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_content_type_tracked_in_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store
            .put("typed", Bytes::from("{}"), Some("application/json"))
            .await
            .unwrap();
        store.put("untyped", Bytes::from("raw"), None).await.unwrap();

        assert_eq!(store.content_type("typed").as_deref(), Some("application/json"));
        assert_eq!(store.content_type("untyped"), None);
        assert_eq!(store.content_type("absent"), None);

        store.delete("typed").await.unwrap();
        assert_eq!(store.content_type("typed"), None);
    }

    #[tokio::test]
    async fn test_missing_key_maps_to_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.get("absent").await,
            Err(StorageError::NotFound { .. })
        ));
        assert!(store.delete("absent").await.is_ok());
    }
}
