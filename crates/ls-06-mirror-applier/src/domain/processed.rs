//! # Processed-Event Cache
//!
//! Recently applied event keys, in front of the store's persistent log.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Bounded LRU of `txDigest#eventSeq` keys.
pub struct ProcessedEventSet {
    cache: Mutex<LruCache<String, ()>>,
}

impl ProcessedEventSet {
    /// Cache holding at most `capacity` keys (at least one).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Whether `key` is cached. Refreshes its recency.
    pub fn contains(&self, key: &str) -> bool {
        self.cache.lock().get(key).is_some()
    }

    /// Remember `key`, evicting the least recent entry when full.
    pub fn insert(&self, key: impl Into<String>) {
        self.cache.lock().put(key.into(), ());
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
