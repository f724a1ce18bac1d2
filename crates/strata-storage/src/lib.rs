//! Content-addressed object storage for the backup engine.
//!
//! A [`backend::ObjectStorage`] composes a [`backend::RawObjectStore`]
//! ([`backend::FilesystemStore`] or [`backend::RemoteStore`]) with an
//! [`envelope::EnvelopeSigner`] and a [`transform::TransformPipeline`],
//! giving callers a plaintext `put_block`/`get_block` interface keyed by
//! `BlockUid`. Object keys are sharded by [`key`] to keep any one backend
//! "directory" from accumulating millions of entries. [`throttle::Throttle`]
//! and [`cache::MemoryReadCache`] are optional decorations for bandwidth-
//! limited or restore-heavy deployments.

pub mod backend;
pub mod cache;
pub mod envelope;
pub mod error;
pub mod key;
pub mod throttle;
pub mod transform;

pub use backend::{FilesystemStore, ObjectStorage, RawObjectStore, ReadCache, RemoteStore};
pub use cache::{CacheStats, MemoryReadCache};
pub use envelope::EnvelopeSigner;
pub use error::Error;
pub use throttle::Throttle;
pub use transform::{StreamCipherTransform, Transform, TransformPipeline, ZlibTransform};

pub use strata_proto::{BlockUid, Envelope, TransformRecord};
