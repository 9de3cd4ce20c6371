//! Request and response body representation.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A body that is either held in memory or parked in an external
/// [`PayloadStore`](crate::storage::PayloadStore).
///
/// `Stored` payloads are resolved back to bytes on demand through
/// [`ExternalStorage::materialize`](crate::storage::ExternalStorage::materialize);
/// resolution is idempotent and does not consume the stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Body bytes held inline. Serialized as base64.
    Inline {
        /// The raw bytes.
        #[serde(with = "base64_bytes")]
        bytes: Bytes,
    },
    /// Reference to a body parked in an external store.
    Stored {
        /// Identifier of the store holding the bytes.
        store_id: String,
        /// Opaque key under which the bytes were put.
        key: String,
        /// Size of the stored bytes.
        size: u64,
        /// Content type recorded at offload time.
        content_type: Option<String>,
    },
}

impl Payload {
    /// Wrap bytes as an inline payload.
    pub fn inline(bytes: impl Into<Bytes>) -> Self {
        Payload::Inline { bytes: bytes.into() }
    }

    /// Body size in bytes.
    pub fn len(&self) -> u64 {
        match self {
            Payload::Inline { bytes } => bytes.len() as u64,
            Payload::Stored { size, .. } => *size,
        }
    }

    /// Whether the body is zero-length.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the bytes are held inline.
    pub fn is_inline(&self) -> bool {
        matches!(self, Payload::Inline { .. })
    }

    /// Inline bytes, if this payload holds them.
    pub fn as_inline(&self) -> Option<&Bytes> {
        match self {
            Payload::Inline { bytes } => Some(bytes),
            Payload::Stored { .. } => None,
        }
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::inline(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::inline(bytes)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::inline(text.as_bytes().to_vec())
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_round_trip() {
        let payload = Payload::inline("hello world");
        let json = serde_json::to_string(&payload).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
        assert_eq!(back.len(), 11);
        assert!(back.is_inline());
    }

    #[test]
    fn test_inline_serializes_as_base64() {
        let payload = Payload::inline(vec![0xff, 0x00, 0x7f]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "inline");
        assert_eq!(json["bytes"], "/wB/");
    }

    #[test]
    fn test_stored_round_trip() {
        let payload = Payload::Stored {
            store_id: "file".to_string(),
            key: "0d9c2ba1".to_string(),
            size: 1 << 20,
            content_type: Some("application/octet-stream".to_string()),
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
        assert!(!back.is_inline());
        assert_eq!(back.as_inline(), None);
    }
}
