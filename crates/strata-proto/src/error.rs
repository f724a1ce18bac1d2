//! Wire-format error types shared between the metadata store, storage
//! layer, and engine.

use thiserror::Error;

/// Errors raised while encoding or decoding a wire-format value.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A `metadata_version` field named a version this build doesn't know
    /// how to read.
    #[error("unsupported metadata version: {0}")]
    UnsupportedMetadataVersion(String),

    /// An envelope or export document is missing a required field.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
