//! An S3-compatible [`RawObjectStore`] built on the `object_store` crate,
//! used for cloud deployments.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore as _;

use super::RawObjectStore;
use crate::error::Error;

pub struct RemoteStore {
    inner: Arc<dyn object_store::ObjectStore>,
}

impl RemoteStore {
    pub fn new(inner: Arc<dyn object_store::ObjectStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RawObjectStore for RemoteStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), Error> {
        let path = ObjectPath::from(key);
        self.inner.put(&path, Bytes::from(data).into()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        let path = ObjectPath::from(key);
        let result = self.inner.get(&path).await?;
        Ok(result.bytes().await?.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let path = ObjectPath::from(key);
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let path = ObjectPath::from(prefix);
        let mut stream = self.inner.list(Some(&path));
        let mut out = Vec::new();
        while let Some(meta) = stream.next().await {
            out.push(meta?.location.to_string());
        }
        Ok(out)
    }
}
