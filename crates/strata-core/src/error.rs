//! Error taxonomy for the metadata store, matched to the engine's exit-code
//! categories: usage, configuration, locking, input-data, scrubbing,
//! storage I/O, and internal invariant violations.

use thiserror::Error;

/// Core metadata-store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied a bad argument (unknown version uid, malformed filter, ...).
    #[error("usage error: {0}")]
    Usage(String),

    /// Problem with the store's own configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The version (or the global cleanup operation) is already locked by
    /// another process.
    #[error("already locked: {0}")]
    AlreadyLocked(String),

    /// Data read back from storage failed validation (bad envelope, size
    /// mismatch, checksum mismatch encountered outside of scrubbing).
    #[error("input data error: {0}")]
    InputData(String),

    /// A scrub found corruption. Carries the number of invalid blocks found
    /// so callers can report it without re-querying.
    #[error("scrubbing error: {invalid_blocks} invalid block(s) found")]
    Scrubbing { invalid_blocks: usize },

    /// The underlying sled database failed.
    #[error("storage error: {0}")]
    StorageIo(#[from] sled::Error),

    /// Wire/document (de)serialization failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] strata_proto::Error),

    /// An invariant the store itself is responsible for was violated; this
    /// should never surface from correct caller input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sled::transaction::TransactionError<Error>> for Error {
    fn from(e: sled::transaction::TransactionError<Error>) -> Self {
        match e {
            sled::transaction::TransactionError::Abort(err) => err,
            sled::transaction::TransactionError::Storage(err) => Error::StorageIo(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("serde_json: {e}"))
    }
}
