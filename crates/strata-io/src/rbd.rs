//! RBD and iSCSI adapters. Both resolve their volume URL to a path under a
//! pre-mapped local block device (`rbd map` / `iscsiadm` are expected to
//! have already run, typically by an external orchestrator) and then reuse
//! [`FileIo`]'s pread/pwrite code path — these devices present the same
//! seekable-byte-range interface as a plain file once mapped.

use async_trait::async_trait;
use url::Url;

use crate::adapter::{BlockIo, BlockSpan};
use crate::error::Error;
use crate::file::FileIo;

/// `rbd:<pool>/<image>[@<snapshot>]` resolved against a configured device
/// mapping directory, e.g. `/dev/rbd/<pool>/<image>`.
pub struct RbdIo {
    inner: FileIo,
}

impl RbdIo {
    pub fn new(url: &Url, device_dir: &str, block_size: u64) -> Result<Self, Error> {
        if url.scheme() != "rbd" {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        let spec = url.path().trim_start_matches('/');
        let (pool_image, _snapshot) = match spec.split_once('@') {
            Some((pool_image, snapshot)) => (pool_image, Some(snapshot)),
            None => (spec, None),
        };
        if pool_image.split('/').count() != 2 {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        let device_path = format!("{device_dir}/{pool_image}");
        let file_url = Url::parse(&format!("file://{device_path}")).map_err(|_| Error::InvalidUrl(url.to_string()))?;
        Ok(Self { inner: FileIo::new(&file_url, block_size)? })
    }
}

#[async_trait]
impl BlockIo for RbdIo {
    async fn size(&self) -> Result<u64, Error> {
        self.inner.size().await
    }

    async fn open_read(&self) -> Result<(), Error> {
        self.inner.open_read().await
    }

    async fn open_write(&self, size: u64, force: bool, sparse: bool) -> Result<(), Error> {
        self.inner.open_write(size, force, sparse).await
    }

    async fn read(&self, span: BlockSpan) -> Result<Vec<u8>, Error> {
        self.inner.read(span).await
    }

    async fn write(&self, span: BlockSpan, data: Vec<u8>) -> Result<(), Error> {
        self.inner.write(span, data).await
    }

    async fn close(&self) -> Result<(), Error> {
        self.inner.close().await
    }
}

/// `iscsi:<iqn>/<lun>` resolved against a configured device mapping
/// directory, e.g. `/dev/disk/by-path/...-iscsi-<iqn>-lun-<lun>`.
pub struct IscsiIo {
    inner: FileIo,
}

impl IscsiIo {
    pub fn new(url: &Url, device_dir: &str, block_size: u64) -> Result<Self, Error> {
        if url.scheme() != "iscsi" {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        let spec = url.path().trim_start_matches('/');
        let (iqn, lun) = spec.rsplit_once('/').ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
        let device_path = format!("{device_dir}/iscsi-{iqn}-lun-{lun}");
        let file_url = Url::parse(&format!("file://{device_path}")).map_err(|_| Error::InvalidUrl(url.to_string()))?;
        Ok(Self { inner: FileIo::new(&file_url, block_size)? })
    }
}

#[async_trait]
impl BlockIo for IscsiIo {
    async fn size(&self) -> Result<u64, Error> {
        self.inner.size().await
    }

    async fn open_read(&self) -> Result<(), Error> {
        self.inner.open_read().await
    }

    async fn open_write(&self, size: u64, force: bool, sparse: bool) -> Result<(), Error> {
        self.inner.open_write(size, force, sparse).await
    }

    async fn read(&self, span: BlockSpan) -> Result<Vec<u8>, Error> {
        self.inner.read(span).await
    }

    async fn write(&self, span: BlockSpan, data: Vec<u8>) -> Result<(), Error> {
        self.inner.write(span, data).await
    }

    async fn close(&self) -> Result<(), Error> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_scheme() {
        let url = Url::parse("file:///tmp/x").unwrap();
        assert!(RbdIo::new(&url, "/dev/rbd", 4 * 1024 * 1024).is_err());
    }

    #[test]
    fn rejects_malformed_pool_image() {
        let url = Url::parse("rbd:///onlyimage").unwrap();
        assert!(RbdIo::new(&url, "/dev/rbd", 4 * 1024 * 1024).is_err());
    }

    #[test]
    fn resolves_pool_image_and_snapshot() {
        let url = Url::parse("rbd:///mypool/myimage@mysnap").unwrap();
        assert!(RbdIo::new(&url, "/dev/rbd", 4 * 1024 * 1024).is_ok());
    }

    #[test]
    fn iscsi_resolves_iqn_and_lun() {
        let url = Url::parse("iscsi:///iqn.2020-01.com.example:target/0").unwrap();
        assert!(IscsiIo::new(&url, "/dev/disk/by-path", 4 * 1024 * 1024).is_ok());
    }
}
