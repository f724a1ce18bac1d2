//! Engine configuration, loaded from a YAML file or built programmatically.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::Error;

fn default_block_size() -> u32 {
    4 * 1024 * 1024
}

fn default_simultaneous_reads() -> usize {
    8
}

fn default_simultaneous_writes() -> usize {
    8
}

fn default_device_dir() -> String {
    "/dev".to_string()
}

/// Where and how block payloads are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Filesystem { path: PathBuf },
    S3 { bucket: String, endpoint: Option<String>, region: Option<String> },
}

/// Engine-wide configuration, the Rust analogue of `benji.yaml`: metadata
/// store location, storage backend, and per-volume I/O concurrency limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory backing the sled metadata store.
    pub metadata_path: PathBuf,

    /// Object storage backend for block payloads and version exports.
    pub storage: StorageConfig,

    /// Default block size in bytes for new backups.
    #[serde(default = "default_block_size")]
    pub block_size: u32,

    /// Concurrent block reads during backup/restore/scrub.
    #[serde(default = "default_simultaneous_reads")]
    pub simultaneous_reads: usize,

    /// Concurrent block writes during backup/restore.
    #[serde(default = "default_simultaneous_writes")]
    pub simultaneous_writes: usize,

    /// Directory under which mapped RBD/iSCSI block devices appear.
    #[serde(default = "default_device_dir")]
    pub device_dir: String,

    /// Grace period in seconds before a tombstoned block is actually
    /// removed from storage during cleanup.
    #[serde(default)]
    pub cleanup_grace_seconds: u64,

    /// HMAC key for envelope signing, hex-encoded. None disables HMAC.
    #[serde(default)]
    pub hmac_key_hex: Option<String>,

    /// Aggregate read bandwidth cap in bytes/second. None means unthrottled.
    #[serde(default)]
    pub bandwidth_read: Option<u64>,

    /// Aggregate write bandwidth cap in bytes/second. None means unthrottled.
    #[serde(default)]
    pub bandwidth_write: Option<u64>,

    /// Transforms applied to every block payload, in wrap order
    /// (`"zlib"`, `"encrypt"`). Empty means blocks are stored as plaintext.
    #[serde(default)]
    pub active_transforms: Vec<String>,

    /// zlib compression level for the `"zlib"` transform.
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Key for the `"encrypt"` transform, hex-encoded. Required if
    /// `active_transforms` names `"encrypt"`.
    #[serde(default)]
    pub encryption_key_hex: Option<String>,
}

fn default_compression_level() -> u32 {
    6
}

/// Parse a `--hints` argument of the form
/// `offset,length,exists;offset,length,exists;...` into the
/// `(offset, length, exists)` tuples [`crate::Engine::backup`] expects.
pub fn parse_hints(s: &str) -> Result<Vec<(u64, u64, bool)>, Error> {
    s.split(';')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let fields: Vec<&str> = part.split(',').collect();
            let [offset, length, exists] = fields.as_slice() else {
                return Err(Error::Usage(format!("malformed hint segment: {part}")));
            };
            let offset: u64 = offset.parse().map_err(|_| Error::Usage(format!("bad offset in hint: {part}")))?;
            let length: u64 = length.parse().map_err(|_| Error::Usage(format!("bad length in hint: {part}")))?;
            let exists = match *exists {
                "0" => false,
                "1" => true,
                _ => return Err(Error::Usage(format!("exists flag must be 0 or 1: {part}"))),
            };
            Ok((offset, length, exists))
        })
        .collect()
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("reading {}: {e}", path.display())))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("parsing {}: {e}", path.display())))
    }

    pub fn filesystem(metadata_path: impl Into<PathBuf>, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            metadata_path: metadata_path.into(),
            storage: StorageConfig::Filesystem { path: storage_path.into() },
            block_size: default_block_size(),
            simultaneous_reads: default_simultaneous_reads(),
            simultaneous_writes: default_simultaneous_writes(),
            device_dir: default_device_dir(),
            cleanup_grace_seconds: 3600,
            hmac_key_hex: None,
            bandwidth_read: None,
            bandwidth_write: None,
            active_transforms: Vec::new(),
            compression_level: default_compression_level(),
            encryption_key_hex: None,
        }
    }
}

/// Command-line arguments for the `strata-engine` binary.
#[derive(Parser, Debug)]
#[command(name = "strata-engine")]
#[command(version, about = "Backup engine: deduplicating block-level backup and restore", long_about = None)]
pub struct Args {
    /// Path to the engine configuration file (YAML).
    #[arg(short, long)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Back up `source` as a new version of `volume`/`snapshot`.
    Backup {
        volume: String,
        snapshot: String,
        source: String,
        base_version: Option<String>,
        /// Change hints narrowing which blocks need reading, as
        /// `offset,length,exists;offset,length,exists;...` (`exists` is
        /// `0` or `1`). Omit to read every block.
        #[arg(long)]
        hints: Option<String>,
    },
    /// Restore `version` to `target`.
    Restore { version: String, target: String, #[arg(long)] force: bool, #[arg(long)] sparse: bool },
    /// Verify stored checksums and envelope integrity for `version`.
    Scrub { version: String, #[arg(long, default_value_t = 100)] block_percentage: u8 },
    /// Verify stored data against `source` for `version`.
    DeepScrub { version: String, source: Option<String>, #[arg(long, default_value_t = 100)] block_percentage: u8 },
    /// Remove storage objects no longer referenced by any version.
    Cleanup { #[arg(long)] override_lock: bool },
    /// Delete versions not covered by `rules` (the retention-rule grammar).
    EnforceRetention {
        rules: String,
        filter: Option<String>,
        #[arg(long)]
        group_label: Option<String>,
    },
    /// Re-export a version's metadata to the storage's `versions/` namespace.
    ExportMetadata { version: String },
    /// Recreate versions from a previously exported metadata document.
    ImportMetadata { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_config_has_expected_defaults() {
        let config = EngineConfig::filesystem("/data/meta", "/data/objects");
        assert_eq!(config.block_size, 4 * 1024 * 1024);
        assert_eq!(config.simultaneous_reads, 8);
        assert!(config.hmac_key_hex.is_none());
    }

    #[test]
    fn parse_hints_splits_segments() {
        let hints = parse_hints("0,4096,1;4096,4096,0").unwrap();
        assert_eq!(hints, vec![(0, 4096, true), (4096, 4096, false)]);
    }

    #[test]
    fn parse_hints_empty_string_is_no_hints() {
        assert!(parse_hints("").unwrap().is_empty());
    }

    #[test]
    fn parse_hints_rejects_malformed_segment() {
        assert!(parse_hints("0,4096").is_err());
        assert!(parse_hints("0,4096,2").is_err());
    }

    #[test]
    fn loads_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(
            &path,
            "metadata_path: /data/meta\nstorage:\n  type: filesystem\n  path: /data/objects\n",
        )
        .unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.metadata_path, PathBuf::from("/data/meta"));
        assert_eq!(config.block_size, default_block_size());
    }
}
