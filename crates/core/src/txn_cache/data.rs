//! Per-transaction state of one transactional cache

use std::collections::HashSet;
use std::hash::Hash;

use repocache_common::collections::LruCache;

use super::bucket::CacheBucket;
use super::region::CacheKey;

/// Outcome of staging a change that may exceed the local bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Staged {
    Ok,
    /// The change pushed the transaction into clear-pending mode for the
    /// first time
    Overflowed,
}

/// Everything one transaction has done to one cache
///
/// The update map is insertion ordered. It accepts up to twice
/// `max_cache_size` entries before evicting; exceeding `max_cache_size`
/// already forces `clear_pending`. Keys that missed in the shared cache are
/// remembered under the same hard bound.
#[derive(Debug)]
pub(crate) struct TransactionData<K, V>
where
    K: Hash + Eq,
{
    updated: LruCache<CacheKey<K>, CacheBucket<V>>,
    missed: LruCache<CacheKey<K>, ()>,
    removed: HashSet<CacheKey<K>>,
    locked: HashSet<CacheKey<K>>,
    max_cache_size: usize,
    pub(crate) clear_pending: bool,
    pub(crate) closed: bool,
    pub(crate) read_only: bool,
    pub(crate) ignore_shared_reads: bool,
    capacity_warned: bool,
}

impl<K, V> TransactionData<K, V>
where
    K: Hash + Eq,
{
    pub(crate) fn new(max_cache_size: usize, read_only: bool) -> Self {
        Self {
            updated: LruCache::with_capacity(max_cache_size.saturating_mul(2)),
            missed: LruCache::with_capacity(max_cache_size.saturating_mul(2)),
            removed: HashSet::new(),
            locked: HashSet::new(),
            max_cache_size,
            clear_pending: false,
            closed: false,
            read_only,
            ignore_shared_reads: false,
            capacity_warned: false,
        }
    }

    pub(crate) fn is_removed(&self, key: &CacheKey<K>) -> bool {
        self.removed.contains(key)
    }

    pub(crate) fn bucket(&self, key: &CacheKey<K>) -> Option<&CacheBucket<V>> {
        self.updated.peek(key)
    }

    /// Whether an earlier read of the key missed in the shared cache
    pub(crate) fn is_missed(&self, key: &CacheKey<K>) -> bool {
        self.missed.contains(key)
    }

    pub(crate) fn is_locked(&self, key: &CacheKey<K>) -> bool {
        self.locked.contains(key)
    }

    pub(crate) fn lock(&mut self, key: CacheKey<K>) {
        self.locked.insert(key);
    }

    pub(crate) fn unlock(&mut self, key: &CacheKey<K>) {
        self.locked.remove(key);
    }

    /// Record a read-through so later reads repeat it
    pub(crate) fn memoize_read(&mut self, key: CacheKey<K>, bucket: CacheBucket<V>) {
        self.insert_bucket(key, bucket);
    }

    /// Record a shared miss so later reads keep missing
    pub(crate) fn memoize_miss(&mut self, key: CacheKey<K>) {
        self.missed.insert(key, ());
    }

    /// Stage a put; the key stops being removed
    pub(crate) fn stage_update(&mut self, key: CacheKey<K>, bucket: CacheBucket<V>) -> Staged {
        self.removed.remove(&key);
        self.missed.pop(&key);
        self.insert_bucket(key, bucket);
        if self.updated.len() > self.max_cache_size {
            return self.force_clear_pending();
        }
        Staged::Ok
    }

    /// Stage a removal
    ///
    /// Any pending update for the key is dropped. Under a pending clear the
    /// key is not tracked separately.
    pub(crate) fn stage_removal(&mut self, key: CacheKey<K>) -> Staged {
        self.updated.pop(&key);
        self.missed.pop(&key);
        if self.clear_pending || self.removed.contains(&key) {
            return Staged::Ok;
        }
        if self.removed.len() >= self.max_cache_size {
            self.removed.clear();
            return self.force_clear_pending();
        }
        self.removed.insert(key);
        Staged::Ok
    }

    /// Stage a clear of the whole shared cache; locks survive
    pub(crate) fn stage_clear(&mut self) {
        self.clear_pending = true;
        self.updated.clear();
        self.missed.clear();
        self.removed.clear();
    }

    pub(crate) fn removed_keys(&self) -> impl Iterator<Item = &CacheKey<K>> {
        self.removed.iter()
    }

    pub(crate) fn buckets(&self) -> impl Iterator<Item = (&CacheKey<K>, &CacheBucket<V>)> {
        self.updated.iter_oldest_first()
    }

    /// Consume the data, yielding buckets in the order they were staged
    pub(crate) fn into_buckets(self) -> impl Iterator<Item = (CacheKey<K>, CacheBucket<V>)> {
        self.updated.into_oldest_first()
    }

    fn insert_bucket(&mut self, key: CacheKey<K>, bucket: CacheBucket<V>) {
        if let Some((_, evicted)) = self.updated.insert(key, bucket) {
            if evicted.is_flushable() {
                self.clear_pending = true;
            }
        }
    }

    fn force_clear_pending(&mut self) -> Staged {
        self.clear_pending = true;
        if self.capacity_warned {
            Staged::Ok
        } else {
            self.capacity_warned = true;
            Staged::Overflowed
        }
    }
}
