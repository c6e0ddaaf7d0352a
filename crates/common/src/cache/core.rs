//! In-process shared cache with configurable eviction

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use parking_lot::RwLock;
use tracing::trace;

use super::config::{CacheConfig, EvictionPolicy};
use super::stats::{CacheStats, MetricsCollector};
use super::traits::SharedCache;
use crate::error::CommonResult;

#[derive(Debug)]
struct CacheStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    entries: HashMap<K, V>,
    /// Eviction order for LRU/FIFO, oldest at the front
    order: VecDeque<K>,
}

impl<K, V> CacheStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self { entries: HashMap::new(), order: VecDeque::new() }
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn forget(&mut self, key: &K) {
        self.order.retain(|k| k != key);
    }
}

/// Thread-safe in-memory [`SharedCache`]
///
/// # Example
/// ```
/// use repocache_common::cache::{CacheConfig, MemoryCache, SharedCache};
///
/// let cache: MemoryCache<String, i32> = MemoryCache::new(CacheConfig::lru("nodeCache", 100));
/// cache.put("node-1".to_string(), 42).unwrap();
/// assert_eq!(cache.get(&"node-1".to_string()).unwrap(), Some(42));
/// ```
#[derive(Debug)]
pub struct MemoryCache<K, V>
where
    K: Eq + Hash + Clone,
{
    storage: RwLock<CacheStorage<K, V>>,
    config: CacheConfig,
    metrics: MetricsCollector,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            storage: RwLock::new(CacheStorage::new()),
            config,
            metrics: MetricsCollector::default(),
        }
    }

    /// Configuration this cache was built with
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.storage.read().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statistics snapshot; counters stay at zero unless `track_metrics`
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), self.config.max_size)
    }

    fn tracks_order(&self) -> bool {
        matches!(self.config.eviction_policy, EvictionPolicy::LRU | EvictionPolicy::FIFO)
    }

    fn evict_one(&self, storage: &mut CacheStorage<K, V>) {
        if let Some(oldest) = storage.order.pop_front() {
            storage.entries.remove(&oldest);
            if self.config.track_metrics {
                self.metrics.record_eviction();
            }
            trace!(cache = %self.config.name, "evicted oldest shared entry");
        }
    }
}

impl<K, V> SharedCache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.config.name
    }

    fn get(&self, key: &K) -> CommonResult<Option<V>> {
        let value = if self.config.eviction_policy == EvictionPolicy::LRU {
            let mut storage = self.storage.write();
            let value = storage.entries.get(key).cloned();
            if value.is_some() {
                storage.touch(key);
            }
            value
        } else {
            self.storage.read().entries.get(key).cloned()
        };

        if self.config.track_metrics {
            if value.is_some() {
                self.metrics.record_hit();
            } else {
                self.metrics.record_miss();
            }
        }
        Ok(value)
    }

    fn put(&self, key: K, value: V) -> CommonResult<()> {
        let mut storage = self.storage.write();

        if let Some(max_size) = self.config.max_size {
            if self.tracks_order()
                && storage.entries.len() >= max_size
                && !storage.entries.contains_key(&key)
            {
                self.evict_one(&mut storage);
            }
        }

        if storage.entries.insert(key.clone(), value).is_some() {
            if self.config.eviction_policy == EvictionPolicy::LRU {
                storage.touch(&key);
            }
        } else if self.tracks_order() {
            storage.order.push_back(key);
        }

        if self.config.track_metrics {
            self.metrics.record_insert();
        }
        Ok(())
    }

    fn remove(&self, key: &K) -> CommonResult<()> {
        let mut storage = self.storage.write();
        if storage.entries.remove(key).is_some() {
            storage.forget(key);
            if self.config.track_metrics {
                self.metrics.record_removal();
            }
        }
        Ok(())
    }

    fn clear(&self) -> CommonResult<()> {
        let mut storage = self.storage.write();
        storage.entries.clear();
        storage.order.clear();
        if self.config.track_metrics {
            self.metrics.record_clear();
        }
        Ok(())
    }

    fn keys(&self) -> CommonResult<Vec<K>> {
        Ok(self.storage.read().entries.keys().cloned().collect())
    }

    fn contains(&self, key: &K) -> CommonResult<bool> {
        Ok(self.storage.read().entries.contains_key(key))
    }
}
