//! A plain-file/local-block-device adapter. Reads and writes go through
//! `pread`/`pwrite` (via [`std::os::unix::fs::FileExt`]) on a blocking
//! thread pool, so concurrent block operations never contend on a shared
//! file cursor.

use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::adapter::{BlockIo, BlockSpan};
use crate::error::Error;

pub struct FileIo {
    path: PathBuf,
    block_size: u64,
    file: Mutex<Option<std::fs::File>>,
}

impl FileIo {
    /// `block_size` is the volume's configured block size, used to compute
    /// pread/pwrite offsets — not the length of any individual span, which
    /// for the volume's final block may be shorter.
    pub fn new(url: &Url, block_size: u64) -> Result<Self, Error> {
        if url.scheme() != "file" {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        let path = PathBuf::from(url.path());
        Ok(Self { path, block_size, file: Mutex::new(None) })
    }

    fn handle(&self) -> std::fs::File {
        self.file
            .lock()
            .expect("file handle mutex poisoned")
            .as_ref()
            .expect("open_read/open_write must be called before read/write")
            .try_clone()
            .expect("failed to clone file handle")
    }
}

#[async_trait]
impl BlockIo for FileIo {
    async fn size(&self) -> Result<u64, Error> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Ok(std::fs::metadata(path)?.len())).await?
    }

    async fn open_read(&self) -> Result<(), Error> {
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().read(true).open(path).map_err(Error::from)
        })
        .await??;
        *self.file.lock().expect("file handle mutex poisoned") = Some(file);
        Ok(())
    }

    async fn open_write(&self, size: u64, force: bool, _sparse: bool) -> Result<(), Error> {
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || -> Result<std::fs::File, Error> {
            if path.exists() {
                if !force {
                    return Err(Error::AlreadyExists(path.display().to_string()));
                }
                let actual = std::fs::metadata(&path)?.len();
                if size > actual {
                    return Err(Error::TooSmall { path: path.display().to_string(), actual, needed: size });
                }
            } else {
                let file = OpenOptions::new().create(true).write(true).truncate(false).open(&path)?;
                if size > 0 {
                    file.set_len(size)?;
                }
            }
            Ok(OpenOptions::new().read(true).write(true).open(&path)?)
        })
        .await??;
        *self.file.lock().expect("file handle mutex poisoned") = Some(file);
        Ok(())
    }

    async fn read(&self, span: BlockSpan) -> Result<Vec<u8>, Error> {
        let file = self.handle();
        let size = span.size;
        let offset = span.index * self.block_size;
        let path_str = self.path.display().to_string();
        tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; size as usize];
            let n = file.read_at(&mut buf, offset)?;
            if n == 0 && size > 0 {
                return Err(Error::UnexpectedEof(path_str));
            }
            buf.truncate(n);
            Ok(buf)
        })
        .await?
    }

    async fn write(&self, span: BlockSpan, data: Vec<u8>) -> Result<(), Error> {
        let file = self.handle();
        let path_str = self.path.display().to_string();
        let offset = span.index * self.block_size;
        tokio::task::spawn_blocking(move || {
            let written = file.write_at(&data, offset)?;
            if written != data.len() {
                return Err(Error::ShortWrite { path: path_str, wrote: written, expected: data.len() });
            }
            Ok(())
        })
        .await?
    }

    async fn close(&self) -> Result<(), Error> {
        *self.file.lock().expect("file handle mutex poisoned") = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_url(path: &std::path::Path) -> Url {
        Url::parse(&format!("file://{}", path.display())).unwrap()
    }

    #[tokio::test]
    async fn writes_and_reads_back_a_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.img");
        let io = FileIo::new(&file_url(&path), 4096).unwrap();
        io.open_write(4096, false, false).await.unwrap();
        io.write(BlockSpan { index: 0, size: 4096 }, vec![7u8; 4096]).await.unwrap();
        io.close().await.unwrap();

        io.open_read().await.unwrap();
        let data = io.read(BlockSpan { index: 0, size: 4096 }).await.unwrap();
        assert_eq!(data, vec![7u8; 4096]);
    }

    #[tokio::test]
    async fn open_write_without_force_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.img");
        std::fs::write(&path, b"existing").unwrap();
        let io = FileIo::new(&file_url(&path), 4096).unwrap();
        assert!(matches!(io.open_write(4096, false, false).await, Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn size_reports_file_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.img");
        let io = FileIo::new(&file_url(&path), 8192).unwrap();
        io.open_write(8192, false, false).await.unwrap();
        assert_eq!(io.size().await.unwrap(), 8192);
    }

    #[tokio::test]
    async fn short_final_block_lands_at_block_size_aligned_offset() {
        // 10 bytes over a 4-byte block size: spans are [4,4,2], but the
        // pread/pwrite offset must come from block_size (4), not from the
        // short final span's own length (2) — index*2 would collide with
        // block 1's data instead of landing at byte 8.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume.img");
        let io = FileIo::new(&file_url(&path), 4).unwrap();
        io.open_write(10, false, false).await.unwrap();
        io.write(BlockSpan { index: 0, size: 4 }, vec![1u8; 4]).await.unwrap();
        io.write(BlockSpan { index: 1, size: 4 }, vec![2u8; 4]).await.unwrap();
        io.write(BlockSpan { index: 2, size: 2 }, vec![3u8; 2]).await.unwrap();
        io.close().await.unwrap();

        io.open_read().await.unwrap();
        let tail = io.read(BlockSpan { index: 2, size: 2 }).await.unwrap();
        assert_eq!(tail, vec![3u8; 2]);
        let middle = io.read(BlockSpan { index: 1, size: 4 }).await.unwrap();
        assert_eq!(middle, vec![2u8; 4]);
    }
}
