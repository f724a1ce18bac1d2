//! Metadata Store: the sled-backed component that owns version and block
//! bookkeeping, the dedup index, locking, retention, and the filter-
//! expression evaluator for selecting versions.

pub mod config;
pub mod error;
pub mod filter;
pub mod hash;
pub mod key;
pub mod model;
pub mod retention;
pub mod store;

pub use config::StoreConfig;
pub use error::Error;
pub use model::{Block, Lock, Version, VersionStatus};
pub use retention::{expand_by_label, parse_rules, versions_to_dismiss, RetentionPolicy};
pub use store::{version_lock_key, MetadataStore, CLEANUP_LOCK_KEY};

/// Re-export wire/document types.
pub use strata_proto as proto;
