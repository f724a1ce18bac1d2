//! A bounded in-memory read cache, decorating [`crate::backend::ObjectStorage`]
//! for restore-heavy and deep-scrub workloads that repeatedly re-read the
//! same blocks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::ReadCache;

struct Entry {
    key: String,
    data: Vec<u8>,
}

/// Hit/miss counters for a [`MemoryReadCache`], snapshotted and logged when
/// the owning [`crate::backend::ObjectStorage`] closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// FIFO-evicted cache bounded by total byte size rather than entry count,
/// since block sizes vary with `object_size` after compression.
pub struct MemoryReadCache {
    max_bytes: usize,
    inner: Mutex<(VecDeque<Entry>, usize)>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryReadCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            inner: Mutex::new((VecDeque::new(), 0)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl ReadCache for MemoryReadCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let guard = self.inner.lock().expect("read cache mutex poisoned");
        let found = guard.0.iter().find(|e| e.key == key).map(|e| e.data.clone());
        match &found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    async fn put(&self, key: &str, data: &[u8]) {
        let mut guard = self.inner.lock().expect("read cache mutex poisoned");
        if guard.0.iter().any(|e| e.key == key) {
            return;
        }
        let (entries, bytes) = &mut *guard;
        entries.push_back(Entry { key: key.to_string(), data: data.to_vec() });
        *bytes += data.len();
        while *bytes > self.max_bytes {
            match entries.pop_front() {
                Some(evicted) => *bytes -= evicted.data.len(),
                None => break,
            }
        }
    }

    fn stats(&self) -> Option<CacheStats> {
        Some(self.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caches_and_returns_entries() {
        let cache = MemoryReadCache::new(1024);
        cache.put("a", b"hello").await;
        assert_eq!(cache.get("a").await, Some(b"hello".to_vec()));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn evicts_oldest_when_over_budget() {
        let cache = MemoryReadCache::new(10);
        cache.put("a", b"0123456789").await;
        cache.put("b", b"abcdefghij").await;
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, Some(b"abcdefghij".to_vec()));
    }
}
