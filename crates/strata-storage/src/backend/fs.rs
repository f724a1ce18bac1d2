//! A local-filesystem [`RawObjectStore`], used for standalone deployments
//! and for tests that would otherwise need a real S3 endpoint.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::RawObjectStore;
use crate::error::Error;

pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl RawObjectStore for FilesystemStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), Error> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        match fs::read(self.path_for(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::ObjectStore(object_store::Error::NotFound {
                    path: key.to_string(),
                    source: Box::new(e),
                }))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let mut out = Vec::new();
        let mut stack = vec![self.root.join(prefix)];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    out.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());
        store.put("blocks/ab/cd/key", b"payload".to_vec()).await.unwrap();
        assert_eq!(store.get("blocks/ab/cd/key").await.unwrap(), b"payload");
        assert!(store.exists("blocks/ab/cd/key").await.unwrap());
        store.delete("blocks/ab/cd/key").await.unwrap();
        assert!(!store.exists("blocks/ab/cd/key").await.unwrap());
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());
        assert!(matches!(
            store.get("blocks/nope").await,
            Err(Error::ObjectStore(object_store::Error::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn list_returns_keys_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());
        store.put("blocks/ab/cd/one", b"1".to_vec()).await.unwrap();
        store.put("blocks/ab/ef/two", b"2".to_vec()).await.unwrap();
        let mut keys = store.list("blocks").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["blocks/ab/cd/one", "blocks/ab/ef/two"]);
    }
}
