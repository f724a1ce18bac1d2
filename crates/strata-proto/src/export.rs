//! The version-export JSON document: used for metadata backup,
//! database-less restore, and cross-instance transfer.
//!
//! Replaces the original's "ad-hoc JSON encoder walking ORM relationships"
//! (Design Notes) with an explicit, schema-driven, symmetric
//! exporter/importer keyed on `metadata_version`.

use crate::block::BlockUid;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The only `metadata_version` this build knows how to read and write.
/// Bump on breaking changes; the format is additive within a major version
/// and readers must ignore unknown fields within it.
pub const METADATA_VERSION: &str = "1.0";

/// One block row as it appears in an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockExport {
    pub index: u64,
    pub uid: BlockUid,
    pub size: u64,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// One version as it appears in an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionExportEntry {
    pub uid: String,
    pub volume: String,
    pub snapshot: String,
    pub size: u64,
    pub block_size: u32,
    pub storage: String,
    pub status: String,
    pub protected: bool,
    /// Unix timestamp, seconds.
    pub date: i64,
    #[serde(default)]
    pub labels: HashMap<String, Option<String>>,
    pub blocks: Vec<BlockExport>,
}

/// The top-level export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionExport {
    pub metadata_version: String,
    pub versions: Vec<VersionExportEntry>,
}

impl VersionExport {
    pub fn new(versions: Vec<VersionExportEntry>) -> Self {
        Self {
            metadata_version: METADATA_VERSION.to_string(),
            versions,
        }
    }

    pub fn to_json_string(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse an export document, refusing any `metadata_version` this build
    /// doesn't recognize rather than guessing at its shape.
    pub fn from_json_str(s: &str) -> Result<Self, Error> {
        let value: serde_json::Value =
            serde_json::from_str(s).map_err(|e| Error::Deserialization(e.to_string()))?;
        let version = value
            .get("metadata_version")
            .and_then(|v| v.as_str())
            .ok_or(Error::MissingField("metadata_version"))?;
        if version != METADATA_VERSION {
            return Err(Error::UnsupportedMetadataVersion(version.to_string()));
        }
        serde_json::from_value(value).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VersionExport {
        VersionExport::new(vec![VersionExportEntry {
            uid: "V0001".into(),
            volume: "vol".into(),
            snapshot: "snap1".into(),
            size: 4096,
            block_size: 4096,
            storage: "default".into(),
            status: "valid".into(),
            protected: false,
            date: 1_700_000_000,
            labels: HashMap::from([("env".to_string(), Some("prod".to_string()))]),
            blocks: vec![BlockExport {
                index: 0,
                uid: BlockUid::new(1, 1),
                size: 4096,
                valid: true,
                checksum: Some("deadbeef".into()),
            }],
        }])
    }

    #[test]
    fn roundtrips() {
        let export = sample();
        let json = export.to_json_string().unwrap();
        let back = VersionExport::from_json_str(&json).unwrap();
        assert_eq!(export, back);
    }

    #[test]
    fn rejects_unknown_metadata_version() {
        let json = r#"{"metadata_version":"99.0","versions":[]}"#;
        let err = VersionExport::from_json_str(json).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMetadataVersion(v) if v == "99.0"));
    }

    #[test]
    fn ignores_unknown_fields() {
        let json = r#"{"metadata_version":"1.0","versions":[],"future_field":42}"#;
        assert!(VersionExport::from_json_str(json).is_ok());
    }
}
