//! Domain model stored by the metadata store: versions, blocks, and labels.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strata_proto::BlockUid;

/// Lifecycle state of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    /// Backup is still in progress.
    Incomplete,
    /// Backup completed and has not yet been scrubbed invalid.
    Valid,
    /// Scrubbing found a checksum mismatch or a missing block.
    Invalid,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Incomplete => "incomplete",
            VersionStatus::Valid => "valid",
            VersionStatus::Invalid => "invalid",
        }
    }
}

/// A backup version: one point-in-time backup of a volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Autoincrement numeric id, also the left half of every block's UID.
    pub id: u64,
    pub volume: String,
    pub snapshot: String,
    pub size: u64,
    pub block_size: u32,
    pub storage: String,
    pub status: VersionStatus,
    pub protected: bool,
    /// Unix timestamp, seconds.
    pub date: i64,
    pub labels: HashMap<String, Option<String>>,
    /// Recorded once the backup that created this version completes.
    #[serde(default)]
    pub stats: Option<VersionStats>,
}

impl Version {
    pub fn uid_string(&self) -> String {
        format!("V{:010}", self.id)
    }
}

/// Aggregate byte counters and wall-clock duration for one backup run,
/// recorded on the version it created once the backup succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionStats {
    /// Bytes read from the source for blocks that were actually read
    /// (excludes blocks skipped via hints or inherited unchanged from a
    /// base version).
    pub bytes_read: u64,
    /// Bytes newly written to object storage (read blocks that weren't
    /// deduplicated against an existing block).
    pub bytes_written: u64,
    /// Bytes read but deduplicated onto an already-stored block instead of
    /// being written again.
    pub bytes_deduplicated: u64,
    /// Bytes classified sparse, whether by content (all-zero) or by a
    /// hint's `exists=false` region.
    pub bytes_sparse: u64,
    pub duration_seconds: u64,
}

/// A single block of a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub version_id: u64,
    pub index: u32,
    pub uid: BlockUid,
    pub size: u64,
    pub valid: bool,
    /// Plaintext checksum (`"sha256:<hex>"`), `None` for a sparse block.
    pub checksum: Option<String>,
}

/// A held lock on a version or on the global cleanup operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    /// Lock key: either `version:<id>` or the literal `global:cleanup`.
    pub key: String,
    /// Process-unique identity of the holder, so a crashed process's stale
    /// lock can be recognized and overridden.
    pub holder: String,
    pub acquired_at: i64,
}
