//! Backup engine library: wires the metadata store, object storage, and
//! block-device I/O adapters together behind the backup/restore/scrub/
//! cleanup/retention operations the `strata-engine` binary and `strata-cli`
//! both call.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod operations;

pub use bootstrap::build_engine;
pub use config::{parse_hints, Args, Command, EngineConfig, StorageConfig};
pub use error::Error;
pub use operations::{Engine, ScrubReport};
