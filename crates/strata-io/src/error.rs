//! I/O adapter errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("the supplied URL '{0}' is invalid")]
    InvalidUrl(String),

    #[error("{0} already exists; pass force to overwrite it")]
    AlreadyExists(String),

    #[error("{path} is too small: it is {actual} bytes, but {needed} bytes are needed")]
    TooSmall { path: String, actual: u64, needed: u64 },

    #[error("end of file reached on {0} when there should be data")]
    UnexpectedEof(String),

    #[error("short write on {path}: wrote {wrote} of {expected} bytes")]
    ShortWrite { path: String, wrote: usize, expected: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
