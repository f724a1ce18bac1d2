//! Block-device I/O adapters behind a uniform [`BlockIo`] interface: plain
//! files ([`FileIo`]), Ceph RBD images, and iSCSI LUNs ([`RbdIo`],
//! [`IscsiIo`]), both of the latter resolving to a pre-mapped local device
//! path and reusing the file code path.

mod adapter;
mod error;
mod file;
mod rbd;

pub use adapter::{BlockIo, BlockSpan};
pub use error::Error;
pub use file::FileIo;
pub use rbd::{IscsiIo, RbdIo};

use url::Url;

/// Construct the right adapter for a volume URL's scheme. `block_size` is
/// the volume's block size (inherited from a base version on an
/// incremental backup, or the version's own block size on restore/scrub) —
/// adapters need it to compute pread/pwrite offsets correctly for a short
/// final block.
pub fn open(url: &Url, device_dir: &str, block_size: u64) -> Result<Box<dyn BlockIo>, Error> {
    match url.scheme() {
        "file" => Ok(Box::new(FileIo::new(url, block_size)?)),
        "rbd" => Ok(Box::new(RbdIo::new(url, device_dir, block_size)?)),
        "iscsi" => Ok(Box::new(IscsiIo::new(url, device_dir, block_size)?)),
        _ => Err(Error::InvalidUrl(url.to_string())),
    }
}
