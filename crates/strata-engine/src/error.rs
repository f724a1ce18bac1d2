//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("metadata store error: {0}")]
    Metadata(#[from] strata_core::Error),

    #[error("storage error: {0}")]
    Storage(#[from] strata_storage::Error),

    #[error("io adapter error: {0}")]
    Io(#[from] strata_io::Error),

    #[error("input data error: {0}")]
    InputData(String),

    #[error("scrubbing failed: {invalid_blocks} invalid block(s)")]
    Scrubbing { invalid_blocks: usize },

    #[error("version {0} is already locked")]
    AlreadyLocked(String),

    #[error("invalid volume URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("filter expression error: {0}")]
    Filter(#[from] strata_lang::LangError),

    #[error("retention rule error: {0}")]
    Retention(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Process exit code per the CLI/RPC exit-code taxonomy: distinct
    /// nonzero codes for usage, configuration, already-locked, scrub/data,
    /// I/O, and internal errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Metadata(strata_core::Error::AlreadyLocked(_)) => 3,
            Error::Usage(_) | Error::InvalidUrl(_) | Error::Filter(_) | Error::Retention(_) => 1,
            Error::Configuration(_) => 2,
            Error::AlreadyLocked(_) => 3,
            Error::Scrubbing { .. } | Error::InputData(_) => 4,
            Error::Metadata(strata_core::Error::InputData(_))
            | Error::Metadata(strata_core::Error::Scrubbing { .. }) => 4,
            Error::Io(_) | Error::Storage(_) => 5,
            Error::Metadata(strata_core::Error::StorageIo(_)) => 5,
            Error::Internal(_) | Error::Metadata(_) => 6,
        }
    }
}
