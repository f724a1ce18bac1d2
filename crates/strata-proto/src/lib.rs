//! Wire and on-disk document types shared across the backup engine:
//! block-UIDs, the object-storage envelope, and the version-export
//! document.
//!
//! # Modules
//!
//! - [`block`] - the `BlockUid` identifier
//! - [`envelope`] - the `.meta` sidecar schema
//! - [`export`] - the version-export JSON document
//! - [`error`] - shared error type

pub mod block;
pub mod envelope;
pub mod error;
pub mod export;

pub use block::BlockUid;
pub use envelope::{Envelope, TransformRecord};
pub use error::Error;
pub use export::{BlockExport, VersionExport, VersionExportEntry, METADATA_VERSION};
