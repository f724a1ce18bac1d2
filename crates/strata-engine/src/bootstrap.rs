//! Construct an [`Engine`] from an [`EngineConfig`]: open the metadata
//! store, wire up the configured object-storage backend, and hand both to
//! the operations layer. Shared by the `strata-engine` binary and
//! `strata-cli`, so there is exactly one place that knows how to turn
//! configuration into a running engine.

use strata_core::{MetadataStore, StoreConfig};
use strata_storage::{
    EnvelopeSigner, FilesystemStore, ObjectStorage, RemoteStore, StreamCipherTransform, Throttle,
    Transform, TransformPipeline, ZlibTransform,
};

use crate::config::{EngineConfig, StorageConfig};
use crate::error::Error;
use crate::operations::Engine;

fn build_transforms(config: &EngineConfig) -> Result<TransformPipeline, Error> {
    let mut transforms: Vec<Box<dyn Transform>> = Vec::new();
    for name in &config.active_transforms {
        match name.as_str() {
            "zlib" => transforms.push(Box::new(ZlibTransform { level: config.compression_level })),
            "encrypt" => {
                let key_hex = config.encryption_key_hex.as_ref().ok_or_else(|| {
                    Error::Configuration("active_transforms names \"encrypt\" but encryption_key_hex is unset".into())
                })?;
                let key = hex::decode(key_hex)
                    .map_err(|e| Error::Configuration(format!("encryption_key_hex: {e}")))?;
                transforms.push(Box::new(StreamCipherTransform { key }));
            }
            other => return Err(Error::Configuration(format!("unknown transform '{other}'"))),
        }
    }
    Ok(TransformPipeline::new(transforms))
}

fn open_storage(config: &EngineConfig) -> Result<ObjectStorage, Error> {
    let signer = match &config.hmac_key_hex {
        Some(hex_key) => {
            let key = hex::decode(hex_key)
                .map_err(|e| Error::Configuration(format!("hmac_key_hex: {e}")))?;
            EnvelopeSigner::new(Some(key))
        }
        None => EnvelopeSigner::unkeyed(),
    };
    let transforms = build_transforms(config)?;

    let mut storage = match &config.storage {
        StorageConfig::Filesystem { path } => {
            ObjectStorage::new(Box::new(FilesystemStore::new(path.clone())), signer, transforms)
        }
        StorageConfig::S3 { bucket, endpoint, region } => {
            let mut builder =
                object_store::aws::AmazonS3Builder::from_env().with_bucket_name(bucket.clone());
            if let Some(endpoint) = endpoint {
                builder = builder.with_endpoint(endpoint.clone());
            }
            if let Some(region) = region {
                builder = builder.with_region(region.clone());
            }
            let s3 = builder
                .build()
                .map_err(|e| Error::Configuration(format!("building S3 client: {e}")))?;
            ObjectStorage::new(Box::new(RemoteStore::new(std::sync::Arc::new(s3))), signer, transforms)
        }
    };

    if let Some(rate) = config.bandwidth_read {
        storage = storage.with_read_throttle(Throttle::new(rate, config.simultaneous_reads));
    }
    if let Some(rate) = config.bandwidth_write {
        storage = storage.with_write_throttle(Throttle::new(rate, config.simultaneous_writes));
    }
    Ok(storage)
}

/// Open the metadata store and object storage named by `config` and
/// return a ready-to-use [`Engine`].
pub fn build_engine(config: EngineConfig) -> Result<Engine, Error> {
    let metadata = MetadataStore::open(StoreConfig::new(config.metadata_path.clone()))?;
    let storage = open_storage(&config)?;
    Ok(Engine::new(metadata, storage, config))
}
