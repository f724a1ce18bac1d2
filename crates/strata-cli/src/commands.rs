//! Subcommands mirroring `strata_engine::Command` one-for-one, plus `ls`
//! for listing versions (the engine itself has no "list" verb — that's a
//! metadata-store read, not an orchestration operation).

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Cli {
    /// Back up `source` as a new version of `volume`/`snapshot`.
    Backup {
        volume: String,
        snapshot: String,
        source: String,
        #[arg(long)]
        base_version: Option<String>,
        /// Change hints narrowing which blocks need reading, as
        /// `offset,length,exists;offset,length,exists;...` (`exists` is
        /// `0` or `1`). Omit to read every block.
        #[arg(long)]
        hints: Option<String>,
    },
    /// Restore `version` to `target`.
    Restore {
        version: String,
        target: String,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        sparse: bool,
    },
    /// Verify stored checksums and envelope integrity for `version`.
    Scrub {
        version: String,
        #[arg(long, default_value_t = 100)]
        block_percentage: u8,
    },
    /// Verify stored data against `source` for `version`.
    DeepScrub {
        version: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long, default_value_t = 100)]
        block_percentage: u8,
    },
    /// Remove storage objects no longer referenced by any version.
    Cleanup {
        #[arg(long)]
        override_lock: bool,
    },
    /// Delete versions not covered by `rules`.
    EnforceRetention {
        rules: String,
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        group_label: Option<String>,
    },
    /// List versions, optionally narrowed by a filter expression.
    Ls { filter: Option<String> },
    /// Re-export a version's metadata to the storage's `versions/` namespace.
    ExportMetadata { version: String },
    /// Recreate versions from a previously exported metadata document.
    ImportMetadata { path: std::path::PathBuf },
}
