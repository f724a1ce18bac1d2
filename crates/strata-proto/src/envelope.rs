//! The `.meta` envelope: the JSON sidecar persisted next to every stored
//! object, carrying size, transform pipeline, checksum, and HMAC.
//!
//! The field layout is bit-exact with the wire format: `size`,
//! `object_size`, `checksum`, `transforms`, `hmac`, in that order, with
//! absent optional fields omitted rather than written as `null`.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Record of one transform applied to an object's payload, in application
/// order. Decapsulation walks this list in reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRecord {
    /// The configured name of the transform (e.g. `"zstd"`, `"aes-gcm"`).
    pub name: String,
    /// The module/implementation identifier, checked against the currently
    /// configured transform of the same name on decapsulation.
    pub module: String,
    /// Transform-specific per-object material (nonce, wrapped key, ...).
    pub materials: serde_json::Value,
}

/// The `.meta` sidecar for a stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Declared logical (plaintext, pre-transform) size in bytes.
    pub size: u64,
    /// Size of the bytes actually persisted for the payload object.
    pub object_size: u64,
    /// Plaintext content hash, hex-encoded. Present for block payloads,
    /// absent for version exports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Transform pipeline applied on write, in application order. Omitted
    /// entirely (not an empty array) when no transforms were applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transforms: Option<Vec<TransformRecord>>,
    /// Keyed HMAC over the canonical serialization of every other field,
    /// present iff the storage has an HMAC key configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
}

impl Envelope {
    pub fn new(size: u64, object_size: u64, checksum: Option<String>) -> Self {
        Self {
            size,
            object_size,
            checksum,
            transforms: None,
            hmac: None,
        }
    }

    pub fn with_transforms(mut self, transforms: Vec<TransformRecord>) -> Self {
        if !transforms.is_empty() {
            self.transforms = Some(transforms);
        }
        self
    }

    /// Serialize everything except the `hmac` field, for HMAC computation
    /// and verification. This is what `hmac` is computed over.
    pub fn canonical_bytes_without_hmac(&self) -> Result<Vec<u8>, Error> {
        let mut unsigned = self.clone();
        unsigned.hmac = None;
        serde_json::to_vec(&unsigned).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_absent_optional_fields() {
        let env = Envelope::new(4096, 4096, None);
        let json = String::from_utf8(env.to_json_bytes().unwrap()).unwrap();
        assert!(!json.contains("checksum"));
        assert!(!json.contains("transforms"));
        assert!(!json.contains("hmac"));
    }

    #[test]
    fn roundtrips_with_transforms_and_hmac() {
        let mut env = Envelope::new(4096, 4112, Some("deadbeef".into())).with_transforms(vec![
            TransformRecord {
                name: "zstd".into(),
                module: "zstd-v1".into(),
                materials: serde_json::json!({}),
            },
        ]);
        env.hmac = Some("abc123".into());
        let bytes = env.to_json_bytes().unwrap();
        let back = Envelope::from_json_bytes(&bytes).unwrap();
        assert_eq!(env, back);
    }

    #[test]
    fn canonical_bytes_exclude_hmac() {
        let mut env = Envelope::new(1, 1, None);
        env.hmac = Some("should-not-appear".into());
        let canonical = env.canonical_bytes_without_hmac().unwrap();
        assert!(!String::from_utf8(canonical).unwrap().contains("should-not-appear"));
    }
}
