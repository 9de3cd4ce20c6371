//! External payload storage.
//!
//! Oversized request and response bodies are parked in a
//! [`PayloadStore`] and replaced by a [`Payload::Stored`] reference;
//! [`ExternalStorage`] decides when that happens and resolves references
//! back to bytes. Adapters share one capability set; keys are opaque
//! strings (the engine generates UUIDs).

pub mod external;
pub mod file;
pub mod memory;

pub use external::ExternalStorage;
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::errors::StorageError;
use async_trait::async_trait;
use bytes::Bytes;

/// Keyed blob store for offloaded payloads.
///
/// Implementations must tolerate repeated `get` calls for the same key
/// (resolution is idempotent) and treat `delete` of a missing key as
/// success.
#[async_trait]
pub trait PayloadStore: Send + Sync {
    /// Stable identifier stamped into `Payload::Stored` references.
    fn store_id(&self) -> &str;

    /// Store `bytes` under `key`.
    async fn put(&self, key: &str, bytes: Bytes, content_type: Option<&str>)
        -> Result<(), StorageError>;

    /// Fetch the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Remove the entry under `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Whether an entry exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}
