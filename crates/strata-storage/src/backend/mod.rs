//! Object-store backends and the capability traits composing them.
//!
//! [`RawObjectStore`] is the narrow "put/get/delete/list bytes" surface any
//! backend must provide. [`ObjectStorage`] wraps a `RawObjectStore` with
//! envelope integrity and the transform pipeline so callers never see raw
//! bytes or `.meta` sidecars directly. An optional [`ReadCache`] decorates
//! either layer.

mod fs;
mod remote;

pub use fs::FilesystemStore;
pub use remote::RemoteStore;

use async_trait::async_trait;
use strata_proto::{BlockUid, Envelope};

use crate::envelope::EnvelopeSigner;
use crate::error::Error;
use crate::throttle::Throttle;
use crate::transform::TransformPipeline;

/// Acquire a throttle's concurrency slot, if one is configured, then sleep
/// out whatever delay its token bucket demands for a transfer of `bytes`
/// size — the throttle itself only ever reports how long to wait.
async fn throttled(throttle: &Option<Throttle>, bytes: usize) -> Option<tokio::sync::SemaphorePermit<'_>> {
    let throttle = throttle.as_ref()?;
    let permit = throttle.permit().await;
    loop {
        let wait = throttle.consume(bytes).await;
        if wait.is_zero() {
            break;
        }
        tokio::time::sleep(wait).await;
    }
    Some(permit)
}

/// The narrow byte-level surface a storage backend must implement. Keys are
/// already fully shard-qualified by [`crate::key`].
#[async_trait]
pub trait RawObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), Error>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, Error>;
    async fn delete(&self, key: &str) -> Result<(), Error>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>, Error>;
    async fn exists(&self, key: &str) -> Result<bool, Error> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(Error::ObjectStore(object_store::Error::NotFound { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// An optional decorator caching recently-read block payloads on local
/// disk, avoiding a round trip to the backing object store on restore-heavy
/// workloads that re-read the same blocks (e.g. deep-scrub).
#[async_trait]
pub trait ReadCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, data: &[u8]);

    /// Hit/miss counters, if this cache implementation tracks them.
    fn stats(&self) -> Option<crate::cache::CacheStats> {
        None
    }
}

/// Composes a [`RawObjectStore`] with envelope integrity and the transform
/// pipeline, giving callers a plaintext put/get interface keyed by
/// [`BlockUid`].
pub struct ObjectStorage {
    raw: Box<dyn RawObjectStore>,
    signer: EnvelopeSigner,
    transforms: TransformPipeline,
    cache: Option<Box<dyn ReadCache>>,
    read_throttle: Option<Throttle>,
    write_throttle: Option<Throttle>,
}

impl ObjectStorage {
    pub fn new(
        raw: Box<dyn RawObjectStore>,
        signer: EnvelopeSigner,
        transforms: TransformPipeline,
    ) -> Self {
        Self { raw, signer, transforms, cache: None, read_throttle: None, write_throttle: None }
    }

    pub fn with_cache(mut self, cache: Box<dyn ReadCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Cap aggregate read bandwidth and concurrent reads at the backend.
    pub fn with_read_throttle(mut self, throttle: Throttle) -> Self {
        self.read_throttle = Some(throttle);
        self
    }

    /// Cap aggregate write bandwidth and concurrent writes at the backend.
    pub fn with_write_throttle(mut self, throttle: Throttle) -> Self {
        self.write_throttle = Some(throttle);
        self
    }

    /// Wrap `data` through the transform pipeline, write the payload and
    /// its `.meta` envelope, and return the envelope for the caller to
    /// persist alongside its own metadata if it wants to.
    pub async fn put_block(
        &self,
        uid: &BlockUid,
        data: &[u8],
        checksum: String,
    ) -> Result<Envelope, Error> {
        let _permit = throttled(&self.write_throttle, data.len()).await;

        let size = data.len() as u64;
        let (wrapped, transforms) = self.transforms.wrap(data)?;
        let object_size = wrapped.len() as u64;
        let envelope = self.signer.build(size, object_size, Some(checksum), transforms)?;

        let payload_key = crate::key::block_key(uid);
        let meta_key = crate::key::block_meta_key(uid);
        self.raw.put(&payload_key, wrapped).await?;
        self.raw.put(&meta_key, envelope.to_json_bytes()?).await?;
        Ok(envelope)
    }

    /// Fetch and verify just a block's envelope (the `.meta` object)
    /// without touching its payload. The cheap, read-only-metadata half of
    /// [`Self::get_block`] — used by a plain (non-deep) scrub, which must
    /// never read payload bytes.
    pub async fn get_block_meta(&self, uid: &BlockUid) -> Result<Envelope, Error> {
        let meta_key = crate::key::block_meta_key(uid);
        let envelope_bytes = self.raw.get(&meta_key).await?;
        let envelope = Envelope::from_json_bytes(&envelope_bytes)?;
        self.signer.verify(&envelope)?;
        Ok(envelope)
    }

    /// Read a block's payload, verify its envelope HMAC, and unwrap the
    /// transform pipeline back to plaintext.
    pub async fn get_block(&self, uid: &BlockUid) -> Result<Vec<u8>, Error> {
        let payload_key = crate::key::block_key(uid);

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&payload_key).await {
                return Ok(cached);
            }
        }

        let envelope = self.get_block_meta(uid).await?;

        let _permit = throttled(&self.read_throttle, envelope.object_size as usize).await;

        let wrapped = self.raw.get(&payload_key).await?;
        if wrapped.len() as u64 != envelope.object_size {
            return Err(Error::SizeMismatch {
                expected: envelope.object_size,
                actual: wrapped.len() as u64,
            });
        }

        let plaintext = self
            .transforms
            .unwrap(&wrapped, envelope.transforms.as_deref().unwrap_or(&[]))?;
        if plaintext.len() as u64 != envelope.size {
            return Err(Error::SizeMismatch {
                expected: envelope.size,
                actual: plaintext.len() as u64,
            });
        }

        if let Some(cache) = &self.cache {
            cache.put(&payload_key, &plaintext).await;
        }
        Ok(plaintext)
    }

    pub async fn delete_block(&self, uid: &BlockUid) -> Result<(), Error> {
        let payload_key = crate::key::block_key(uid);
        let meta_key = crate::key::block_meta_key(uid);
        self.raw.delete(&payload_key).await?;
        self.raw.delete(&meta_key).await?;
        Ok(())
    }

    pub async fn block_exists(&self, uid: &BlockUid) -> Result<bool, Error> {
        self.raw.exists(&crate::key::block_key(uid)).await
    }

    pub async fn put_version_export(&self, uid: &str, data: Vec<u8>) -> Result<(), Error> {
        self.raw.put(&crate::key::version_key(uid), data).await
    }

    pub async fn get_version_export(&self, uid: &str) -> Result<Vec<u8>, Error> {
        self.raw.get(&crate::key::version_key(uid)).await
    }

    /// Log the read cache's hit/miss counters, if any. Call once when done
    /// with this storage handle (e.g. at the end of a backup/restore run).
    pub fn close(&self) {
        if let Some(cache) = &self.cache {
            if let Some(stats) = cache.stats() {
                tracing::info!(hits = stats.hits, misses = stats.misses, "read cache closed");
            }
        }
    }
}
