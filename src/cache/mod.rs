//! Query Cache Module
//!
//! Bounded least-recently-used cache of query results for one table.
//!
//! ## Responsibilities
//! - Remember result sets keyed by an opaque query key
//! - Evict the least-recently-used entry once capacity is exceeded
//! - Drop everything when the owning table is mutated
//!
//! The cache never touches storage and does not survive a restart.

use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// Bounded LRU cache; a capacity of zero disables caching entirely
pub struct QueryCache<K: Hash + Eq, V> {
    /// `None` when the cache is disabled
    entries: Option<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> QueryCache<K, V> {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Look up a cached result, marking it most-recently-used
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.as_mut()?.get(key).cloned()
    }

    /// Insert or replace an entry, evicting the LRU entry if full
    pub fn put(&mut self, key: K, value: V) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(key, value);
        }
    }

    /// Check for an entry without touching its recency
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries
            .as_ref()
            .map_or(false, |entries| entries.contains(key))
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries (0 if disabled)
    pub fn capacity(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |entries| entries.cap().get())
    }
}
