//! The uniform interface every block-device adapter implements. Matches the
//! split between a synchronous call a caller can await directly and the
//! submit/poll-completion shape the engine's worker pools use for bulk
//! backup and restore.

use async_trait::async_trait;

use crate::error::Error;

/// One block's worth of work: which index within the volume, and how many
/// bytes it spans (the last block of a volume may be shorter than
/// `block_size`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub index: u64,
    pub size: u64,
}

/// A block device or file addressed by `url`, read and written in
/// `block_size`-sized chunks.
#[async_trait]
pub trait BlockIo: Send + Sync {
    /// Total size of the device/file in bytes.
    async fn size(&self) -> Result<u64, Error>;

    /// Open for reading. Adapters that need to resolve a remote volume to a
    /// local device path (RBD, iSCSI) do that here.
    async fn open_read(&self) -> Result<(), Error>;

    /// Open for writing, creating and sizing the target if it doesn't
    /// exist. `force` permits overwriting an existing target; `sparse`
    /// requests a sparse-allocated target where the backend supports it.
    async fn open_write(&self, size: u64, force: bool, sparse: bool) -> Result<(), Error>;

    async fn read(&self, span: BlockSpan) -> Result<Vec<u8>, Error>;

    async fn write(&self, span: BlockSpan, data: Vec<u8>) -> Result<(), Error>;

    async fn close(&self) -> Result<(), Error>;
}
