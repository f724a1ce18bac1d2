//! Storage-backend errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] strata_proto::Error),

    #[error("envelope is missing a required field: {0}")]
    MissingEnvelopeField(&'static str),

    #[error("envelope HMAC verification failed")]
    HmacMismatch,

    #[error("block size mismatch: envelope says {expected}, object is {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("unknown transform '{0}'")]
    UnknownTransform(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
