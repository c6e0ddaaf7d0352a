//! Cache manager - owns every cache of one repository instance
//!
//! The manager is constructed explicitly and handed to whatever needs
//! caches. It owns the refresh worker pool, the refresh registry and the
//! transaction manager, and hands out caches by name: asking twice for the
//! same name returns the same instance.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use repocache_common::cache::{CacheConfig, MemoryCache};
use repocache_common::utils::saturating_millis;
use tracing::{debug, info, warn};

use crate::config::{CacheManagerConfig, TransactionalCacheConfig};
use crate::error::{CacheError, CacheResult};
use crate::refresh::{
    AsyncRefreshCache, CacheBuilder, LocalRefreshRegistry, RefreshExecutor,
    RefreshableCacheRegistry, ThreadPoolExecutor,
};
use crate::tenant::TenantResolver;
use crate::transaction::TransactionManager;
use crate::txn_cache::{
    CacheKey, CacheKeyType, CacheValueType, SharedStore, TransactionalCache, ValueWrapper,
};

/// Type alias for the tenant resolver trait object
type DynTenantResolver = dyn TenantResolver;

/// Type alias for the refresh executor trait object
type DynRefreshExecutor = dyn RefreshExecutor;

/// What the manager needs from each cache it owns, independent of the
/// cache's key and value types
trait ManagedCache: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Drop all shared entries
    fn clear_shared(&self) -> CacheResult<()>;

    fn shutdown(&self) {}

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<K, V> ManagedCache for TransactionalCache<K, V>
where
    K: CacheKeyType,
    V: CacheValueType,
{
    fn kind(&self) -> &'static str {
        "transactional"
    }

    fn clear_shared(&self) -> CacheResult<()> {
        self.clear(None)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<T> ManagedCache for AsyncRefreshCache<T>
where
    T: Send + Sync + 'static,
{
    fn kind(&self) -> &'static str {
        "refreshable"
    }

    fn clear_shared(&self) -> CacheResult<()> {
        Ok(())
    }

    fn shutdown(&self) {
        AsyncRefreshCache::shutdown(self);
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Explicitly owned registry of all caches
pub struct CacheManager {
    config: CacheManagerConfig,
    tenants: Arc<DynTenantResolver>,
    executor: Arc<DynRefreshExecutor>,
    registry: Arc<LocalRefreshRegistry>,
    transactions: TransactionManager,
    caches: RwLock<HashMap<String, Arc<dyn ManagedCache>>>,
}

impl CacheManager {
    /// Create a manager with a refresh pool sized from `config`
    pub fn new(config: CacheManagerConfig, tenants: Arc<DynTenantResolver>) -> CacheResult<Self> {
        config.validate()?;
        let executor = Arc::new(ThreadPoolExecutor::new(config.refresh.worker_threads)?);
        Self::with_executor(config, tenants, executor)
    }

    /// Create a manager that runs rebuilds on `executor`
    pub fn with_executor(
        config: CacheManagerConfig,
        tenants: Arc<DynTenantResolver>,
        executor: Arc<DynRefreshExecutor>,
    ) -> CacheResult<Self> {
        config.validate()?;
        info!(
            configured_caches = config.caches.len(),
            worker_threads = config.refresh.worker_threads,
            retry_delay_ms = saturating_millis(config.refresh.retry_delay),
            "cache manager initialized"
        );
        Ok(Self {
            config,
            tenants,
            executor,
            registry: Arc::new(LocalRefreshRegistry::new()),
            transactions: TransactionManager::new(),
            caches: RwLock::new(HashMap::new()),
        })
    }

    pub const fn config(&self) -> &CacheManagerConfig {
        &self.config
    }

    pub const fn transaction_manager(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Registry through which refresh events reach the refreshable caches
    pub fn registry(&self) -> Arc<dyn RefreshableCacheRegistry> {
        self.registry.clone()
    }

    /// Get or create the transactional cache `name`, backed by an in-process
    /// shared cache
    ///
    /// Settings come from the configuration entry of the same name, or from
    /// the defaults when there is none.
    pub fn transactional_cache<K, V>(&self, name: &str) -> CacheResult<Arc<TransactionalCache<K, V>>>
    where
        K: CacheKeyType,
        V: CacheValueType,
    {
        self.get_or_register(name, |config| {
            let shared_config = match config.shared_max_size {
                Some(size) => CacheConfig::lru(name, size),
                None => CacheConfig::unbounded(name),
            };
            let shared: Arc<SharedStore<K, V>> =
                Arc::new(MemoryCache::<CacheKey<K>, ValueWrapper<V>>::new(shared_config));
            shared
        })
    }

    /// Get or create the transactional cache `name` on top of a caller
    /// supplied shared cache
    ///
    /// `shared` is ignored if the cache already exists.
    pub fn transactional_cache_with_shared<K, V>(
        &self,
        name: &str,
        shared: Arc<SharedStore<K, V>>,
    ) -> CacheResult<Arc<TransactionalCache<K, V>>>
    where
        K: CacheKeyType,
        V: CacheValueType,
    {
        self.get_or_register(name, |_| shared)
    }

    /// Get or create the refreshable cache `cache_id`
    ///
    /// `builder` is only used when the cache is created.
    pub fn refresh_cache<T>(
        &self,
        cache_id: &str,
        builder: Arc<dyn CacheBuilder<T>>,
    ) -> CacheResult<Arc<AsyncRefreshCache<T>>>
    where
        T: Send + Sync + 'static,
    {
        let mut caches = self.caches.write();
        if let Some(existing) = caches.get(cache_id) {
            return downcast(cache_id, existing);
        }

        let cache = AsyncRefreshCache::new(
            cache_id,
            builder,
            self.executor.clone(),
            self.registry.clone(),
            &self.config.refresh,
        );
        caches.insert(cache_id.to_string(), cache.clone());
        debug!(cache_id, "refreshable cache created");
        Ok(cache)
    }

    /// Names of all caches created so far, sorted
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Clear the shared level of every transactional cache
    pub fn clear_all(&self) -> CacheResult<()> {
        let caches: Vec<(String, Arc<dyn ManagedCache>)> =
            self.caches.read().iter().map(|(name, cache)| (name.clone(), cache.clone())).collect();
        for (name, cache) in caches {
            cache.clear_shared()?;
            debug!(cache = %name, kind = cache.kind(), "cache cleared");
        }
        Ok(())
    }

    /// Stop background rebuilds of every refreshable cache
    pub fn shutdown(&self) {
        for cache in self.caches.read().values() {
            cache.shutdown();
        }
    }

    fn get_or_register<K, V>(
        &self,
        name: &str,
        shared: impl FnOnce(&TransactionalCacheConfig) -> Arc<SharedStore<K, V>>,
    ) -> CacheResult<Arc<TransactionalCache<K, V>>>
    where
        K: CacheKeyType,
        V: CacheValueType,
    {
        let mut caches = self.caches.write();
        if let Some(existing) = caches.get(name) {
            return downcast(name, existing);
        }

        let config = match self.config.cache(name) {
            Some(config) => config.clone(),
            None => {
                warn!(cache = name, "no configuration for cache, using defaults");
                TransactionalCacheConfig::new(name)
            }
        };
        config.validate()?;
        let shared = shared(&config);
        let cache = TransactionalCache::new(config, shared, self.tenants.clone());
        caches.insert(name.to_string(), cache.clone());
        info!(
            cache = name,
            max_cache_size = cache.config().max_cache_size,
            mutable = cache.config().mutable,
            tenant_aware = cache.config().tenant_aware,
            "transactional cache created"
        );
        Ok(cache)
    }
}

fn downcast<C>(name: &str, cache: &Arc<dyn ManagedCache>) -> CacheResult<Arc<C>>
where
    C: Send + Sync + 'static,
{
    cache
        .clone()
        .into_any()
        .downcast::<C>()
        .map_err(|_| CacheError::CacheTypeMismatch(name.to_string()))
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("caches", &self.cache_names())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
