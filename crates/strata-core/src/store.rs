//! The metadata store: versions, blocks, the dedup index, locks, and the
//! delete-candidate tombstone tree, all backed by one sled database.

use std::collections::HashSet;

use sled::Db;
use strata_proto::{BlockExport, BlockUid, VersionExport, VersionExportEntry};

use crate::config::StoreConfig;
use crate::error::Error;
use crate::key;
use crate::model::{Block, Lock, Version, VersionStats, VersionStatus};

const VERSIONS_TREE: &str = "versions";
const BLOCKS_TREE: &str = "blocks";
const DEDUP_TREE: &str = "dedup";
const LOCKS_TREE: &str = "locks";
const TOMBSTONES_TREE: &str = "tombstones";
const META_TREE: &str = "meta";
const NEXT_VERSION_ID_KEY: &[u8] = b"next_version_id";

/// The global lock key guarding cleanup, so at most one process runs it.
pub const CLEANUP_LOCK_KEY: &str = "global:cleanup";

pub struct MetadataStore {
    db: Db,
    versions: sled::Tree,
    blocks: sled::Tree,
    dedup: sled::Tree,
    locks: sled::Tree,
    tombstones: sled::Tree,
    meta: sled::Tree,
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn version_lock_key(version_id: u64) -> String {
    format!("version:{version_id}")
}

impl MetadataStore {
    pub fn open(config: StoreConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        Ok(Self {
            versions: db.open_tree(VERSIONS_TREE)?,
            blocks: db.open_tree(BLOCKS_TREE)?,
            dedup: db.open_tree(DEDUP_TREE)?,
            locks: db.open_tree(LOCKS_TREE)?,
            tombstones: db.open_tree(TOMBSTONES_TREE)?,
            meta: db.open_tree(META_TREE)?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    // ---------- versions ----------

    fn next_version_id(&self) -> Result<u64, Error> {
        let new_value = self
            .meta
            .update_and_fetch(NEXT_VERSION_ID_KEY, |old| {
                let current = old
                    .map(|bytes| u64::from_be_bytes(bytes.try_into().unwrap_or([0; 8])))
                    .unwrap_or(0);
                Some((current + 1).to_be_bytes().to_vec())
            })?
            .expect("update_and_fetch always returns Some when the closure returns Some");
        Ok(u64::from_be_bytes(new_value.as_ref().try_into().unwrap_or([0; 8])))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_version(
        &self,
        volume: impl Into<String>,
        snapshot: impl Into<String>,
        size: u64,
        block_size: u32,
        storage: impl Into<String>,
        labels: std::collections::HashMap<String, Option<String>>,
        now: i64,
    ) -> Result<Version, Error> {
        let id = self.next_version_id()?;
        let version = Version {
            id,
            volume: volume.into(),
            snapshot: snapshot.into(),
            size,
            block_size,
            storage: storage.into(),
            status: VersionStatus::Incomplete,
            protected: false,
            date: now,
            labels,
            stats: None,
        };
        self.versions.insert(key::version_key(id), encode(&version)?)?;
        Ok(version)
    }

    pub fn get_version(&self, id: u64) -> Result<Option<Version>, Error> {
        match self.versions.get(key::version_key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn require_version(&self, id: u64) -> Result<Version, Error> {
        self.get_version(id)?
            .ok_or_else(|| Error::Usage(format!("no such version: {id}")))
    }

    pub fn list_versions(&self) -> Result<Vec<Version>, Error> {
        self.versions
            .iter()
            .values()
            .map(|r| decode(&r?))
            .collect()
    }

    pub fn filter_versions(&self, filter: &strata_lang::CompiledFilter) -> Result<Vec<Version>, Error> {
        Ok(self
            .list_versions()?
            .into_iter()
            .filter(|v| crate::filter::matches(filter, v))
            .collect())
    }

    pub fn set_status(&self, id: u64, status: VersionStatus) -> Result<(), Error> {
        let mut version = self.require_version(id)?;
        version.status = status;
        self.versions.insert(key::version_key(id), encode(&version)?)?;
        Ok(())
    }

    pub fn set_protected(&self, id: u64, protected: bool) -> Result<(), Error> {
        let mut version = self.require_version(id)?;
        version.protected = protected;
        self.versions.insert(key::version_key(id), encode(&version)?)?;
        Ok(())
    }

    /// Record the byte/duration counters from a completed backup run.
    pub fn set_stats(&self, id: u64, stats: VersionStats) -> Result<(), Error> {
        let mut version = self.require_version(id)?;
        version.stats = Some(stats);
        self.versions.insert(key::version_key(id), encode(&version)?)?;
        Ok(())
    }

    /// Set a label's value, overwriting any prior value under the same name.
    pub fn add_label(&self, id: u64, name: impl Into<String>, value: Option<String>) -> Result<(), Error> {
        let mut version = self.require_version(id)?;
        version.labels.insert(name.into(), value);
        self.versions.insert(key::version_key(id), encode(&version)?)?;
        Ok(())
    }

    /// Remove a label by name. A no-op if the label was never set.
    pub fn remove_label(&self, id: u64, name: &str) -> Result<(), Error> {
        let mut version = self.require_version(id)?;
        version.labels.remove(name);
        self.versions.insert(key::version_key(id), encode(&version)?)?;
        Ok(())
    }

    /// Remove a version and its blocks. Any block UID no longer referenced
    /// by any remaining version is tombstoned for later cleanup rather than
    /// deleted immediately, so a grace period can elapse before the backing
    /// storage object is actually removed.
    pub fn delete_version(&self, id: u64, now: i64) -> Result<(), Error> {
        let blocks = self.get_blocks(id)?;
        self.versions.remove(key::version_key(id))?;
        for b in &self.blocks_prefix_keys(id) {
            self.blocks.remove(b)?;
        }

        let mut candidate_uids: HashSet<BlockUid> = HashSet::new();
        for b in blocks {
            if !b.uid.is_sparse() {
                candidate_uids.insert(b.uid);
            }
        }

        if !candidate_uids.is_empty() {
            let still_referenced = self.referenced_block_uids()?;
            for uid in candidate_uids {
                if !still_referenced.contains(&uid) {
                    let tomb_key = uid.object_key_component();
                    self.tombstones
                        .insert(tomb_key.as_bytes(), now.to_be_bytes().to_vec())?;
                }
            }
        }

        Ok(())
    }

    fn blocks_prefix_keys(&self, version_id: u64) -> Vec<sled::IVec> {
        self.blocks
            .scan_prefix(key::block_key_prefix(version_id))
            .keys()
            .filter_map(Result::ok)
            .collect()
    }

    // ---------- blocks ----------

    #[allow(clippy::too_many_arguments)]
    pub fn add_block(
        &self,
        version_id: u64,
        index: u32,
        uid: BlockUid,
        size: u64,
        valid: bool,
        checksum: Option<String>,
    ) -> Result<(), Error> {
        let block = Block {
            version_id,
            index,
            uid,
            size,
            valid,
            checksum,
        };
        self.blocks
            .insert(key::block_key(version_id, index), encode(&block)?)?;
        Ok(())
    }

    pub fn get_blocks(&self, version_id: u64) -> Result<Vec<Block>, Error> {
        self.blocks
            .scan_prefix(key::block_key_prefix(version_id))
            .values()
            .map(|r| decode(&r?))
            .collect()
    }

    pub fn set_block_valid(&self, version_id: u64, index: u32, valid: bool) -> Result<(), Error> {
        let k = key::block_key(version_id, index);
        let mut block: Block = match self.blocks.get(&k)? {
            Some(bytes) => decode(&bytes)?,
            None => return Err(Error::Internal(format!("no such block: {version_id}/{index}"))),
        };
        block.valid = valid;
        self.blocks.insert(k, encode(&block)?)?;
        Ok(())
    }

    /// All block UIDs referenced by any version currently in the store.
    pub fn referenced_block_uids(&self) -> Result<HashSet<BlockUid>, Error> {
        let mut uids = HashSet::new();
        for r in self.blocks.iter().values() {
            let block: Block = decode(&r?)?;
            if !block.uid.is_sparse() {
                uids.insert(block.uid);
            }
        }
        Ok(uids)
    }

    // ---------- dedup index ----------

    /// Look up a block already stored with this checksum under this storage
    /// backend. The result is a hint: the caller must still confirm the
    /// object is present before reusing it, since cleanup may have removed
    /// it since the index entry was written.
    pub fn find_duplicate(&self, checksum: &str, storage: &str) -> Result<Option<BlockUid>, Error> {
        match self.dedup.get(key::dedup_key(checksum, storage))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Record a block as the dedup exemplar for its checksum, unless one is
    /// already recorded.
    pub fn record_dedup_entry(&self, checksum: &str, storage: &str, uid: BlockUid) -> Result<(), Error> {
        let k = key::dedup_key(checksum, storage);
        if self.dedup.get(&k)?.is_none() {
            self.dedup.insert(k, encode(&uid)?)?;
        }
        Ok(())
    }

    // ---------- locking ----------

    pub fn lock(&self, key: &str, holder: &str, now: i64) -> Result<(), Error> {
        if let Some(bytes) = self.locks.get(key)? {
            let existing: Lock = decode(&bytes)?;
            if existing.holder != holder {
                return Err(Error::AlreadyLocked(key.to_string()));
            }
            return Ok(());
        }
        let lock = Lock {
            key: key.to_string(),
            holder: holder.to_string(),
            acquired_at: now,
        };
        self.locks.insert(key, encode(&lock)?)?;
        Ok(())
    }

    pub fn unlock(&self, key: &str, holder: &str) -> Result<(), Error> {
        match self.locks.get(key)? {
            Some(bytes) => {
                let existing: Lock = decode(&bytes)?;
                if existing.holder != holder {
                    return Err(Error::Usage(format!("lock '{key}' is not held by '{holder}'")));
                }
                self.locks.remove(key)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Force-remove a lock regardless of holder, for recovering from a
    /// crashed process.
    pub fn override_lock(&self, key: &str) -> Result<(), Error> {
        self.locks.remove(key)?;
        Ok(())
    }

    pub fn lock_holder(&self, key: &str) -> Result<Option<String>, Error> {
        match self.locks.get(key)? {
            Some(bytes) => Ok(Some(decode::<Lock>(&bytes)?.holder)),
            None => Ok(None),
        }
    }

    // ---------- delete candidates (cleanup) ----------

    /// Block object-key components whose tombstone is at least
    /// `grace_seconds` old, ready for the engine to remove from object
    /// storage. Re-checks live references at scan time: if a concurrent
    /// backup has since deduplicated onto a tombstoned UID, that's a false
    /// positive — the tombstone is discarded and the UID is not collected.
    pub fn delete_candidates(&self, grace_seconds: i64, now: i64) -> Result<Vec<String>, Error> {
        let live = self.referenced_block_uids()?;
        let mut candidates = Vec::new();
        for entry in self.tombstones.iter() {
            let (k, v) = entry?;
            let tombstoned_at = i64::from_be_bytes(v.as_ref().try_into().map_err(|_| {
                Error::Internal("corrupt tombstone timestamp".to_string())
            })?);
            if now - tombstoned_at < grace_seconds {
                continue;
            }
            let component = String::from_utf8_lossy(&k).into_owned();
            let still_referenced = BlockUid::parse_object_key_component(&component)
                .map(|uid| live.contains(&uid))
                .unwrap_or(false);
            if still_referenced {
                self.tombstones.remove(&k)?;
                continue;
            }
            candidates.push(component);
        }
        Ok(candidates)
    }

    pub fn clear_delete_candidate(&self, object_key_component: &str) -> Result<(), Error> {
        self.tombstones.remove(object_key_component.as_bytes())?;
        Ok(())
    }

    // ---------- export / import ----------

    pub fn export_versions(&self, ids: &[u64]) -> Result<VersionExport, Error> {
        let mut entries = Vec::with_capacity(ids.len());
        for &id in ids {
            let version = self.require_version(id)?;
            let blocks = self.get_blocks(id)?;
            entries.push(VersionExportEntry {
                uid: version.uid_string(),
                volume: version.volume,
                snapshot: version.snapshot,
                size: version.size,
                block_size: version.block_size,
                storage: version.storage,
                status: version.status.as_str().to_string(),
                protected: version.protected,
                date: version.date,
                labels: version.labels,
                blocks: blocks
                    .into_iter()
                    .map(|b| BlockExport {
                        index: b.index,
                        uid: b.uid,
                        size: b.size,
                        valid: b.valid,
                        checksum: b.checksum,
                    })
                    .collect(),
            });
        }
        Ok(VersionExport::new(entries))
    }

    /// Import versions from an export document, assigning each a fresh id
    /// and remapping its blocks' UIDs onto that new id.
    pub fn import_versions(&self, export: &VersionExport) -> Result<Vec<u64>, Error> {
        let mut new_ids = Vec::with_capacity(export.versions.len());
        for entry in &export.versions {
            let new_id = self.next_version_id()?;
            let version = Version {
                id: new_id,
                volume: entry.volume.clone(),
                snapshot: entry.snapshot.clone(),
                size: entry.size,
                block_size: entry.block_size,
                storage: entry.storage.clone(),
                status: match entry.status.as_str() {
                    "valid" => VersionStatus::Valid,
                    "invalid" => VersionStatus::Invalid,
                    _ => VersionStatus::Incomplete,
                },
                protected: entry.protected,
                date: entry.date,
                labels: entry.labels.clone(),
                stats: None,
            };
            self.versions.insert(key::version_key(new_id), encode(&version)?)?;

            for block in &entry.blocks {
                let uid = if block.uid.is_sparse() {
                    BlockUid::sparse()
                } else {
                    BlockUid::for_block(new_id, block.index)
                };
                self.add_block(new_id, block.index, uid, block.size, block.valid, block.checksum.clone())?;
            }
            new_ids.push(new_id);
        }
        Ok(new_ids)
    }
}
