//! Two-level transactional cache
//!
//! Each transaction works against its own [`TransactionData`]: puts, removes
//! and clears stay local until the transaction completes, and reads fall
//! through to the shared cache once, after which they are repeatable for the
//! rest of the transaction. On commit the local state is merged into the
//! shared cache:
//!
//! - **pre-commit**: pending removals (or a pending clear) are applied and the
//!   transaction-local state is closed to further changes
//! - **post-commit**: removals are applied again, then every staged value is
//!   written if and only if the shared entry provably has not moved since the
//!   transaction observed it; otherwise the entry is invalidated
//! - **rollback**: only removals and clears are applied
//!
//! Removals and clears always propagate because a stale shared entry is
//! worse than a cache miss. Updates only propagate on commit.
//!
//! ```
//! use std::sync::Arc;
//!
//! use repocache_common::cache::{CacheConfig, MemoryCache};
//! use repocache_core::config::TransactionalCacheConfig;
//! use repocache_core::tenant::FixedTenantResolver;
//! use repocache_core::transaction::{TransactionManager, TxnReadState};
//! use repocache_core::txn_cache::{CacheKey, TransactionalCache, ValueWrapper};
//!
//! let shared: Arc<MemoryCache<CacheKey<String>, ValueWrapper<u64>>> =
//!     Arc::new(MemoryCache::new(CacheConfig::unbounded("nodeCache")));
//! let cache = TransactionalCache::<String, u64>::new(
//!     TransactionalCacheConfig::new("nodeCache"),
//!     shared,
//!     Arc::new(FixedTenantResolver::default_tenant()),
//! );
//!
//! let txns = TransactionManager::new();
//! let txn = txns.begin(TxnReadState::ReadWrite);
//! cache.put(Some(&txn), "node-1".to_string(), 7).unwrap();
//! assert_eq!(cache.get(None, &"node-1".to_string()).unwrap(), None);
//! txn.commit().unwrap();
//! assert_eq!(cache.get(None, &"node-1".to_string()).unwrap(), Some(7));
//! ```

mod bucket;
mod data;
mod region;
mod wrapper;

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use repocache_common::cache::{NullCache, SharedCache};
use repocache_common::error::CommonError;
use tracing::{debug, error, trace, warn};

pub use bucket::{CacheBucket, CommitPolicy, PostCommitAction};
use data::{Staged, TransactionData};
pub use region::{CacheKey, RegionKey};
pub use wrapper::ValueWrapper;

use crate::config::TransactionalCacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::tenant::{is_default_tenant, TenantResolver};
use crate::transaction::{Transaction, TransactionListener, TxnId};

/// Shared cache as seen by a [`TransactionalCache`]
pub type SharedStore<K, V> = dyn SharedCache<CacheKey<K>, ValueWrapper<V>>;

/// Bounds required of cache keys
pub trait CacheKeyType: Clone + Eq + Hash + Debug + Send + Sync + 'static {}
impl<T> CacheKeyType for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Bounds required of cache values
pub trait CacheValueType: Clone + PartialEq + Debug + Send + Sync + 'static {}
impl<T> CacheValueType for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

/// How a call relates to transaction-local state
enum Scope<'a> {
    /// No transaction: operate on the shared cache directly
    Shared,
    /// The transaction can no longer change local state
    Closed(TxnId),
    Open(&'a Transaction),
}

/// A cache whose changes become visible to others only when the changing
/// transaction commits
pub struct TransactionalCache<K, V>
where
    K: CacheKeyType,
    V: CacheValueType,
{
    config: TransactionalCacheConfig,
    shared: Arc<SharedStore<K, V>>,
    tenants: Arc<dyn TenantResolver>,
    txn_data: DashMap<TxnId, TransactionData<K, V>>,
    weak_self: Weak<Self>,
}

impl<K, V> TransactionalCache<K, V>
where
    K: CacheKeyType,
    V: CacheValueType,
{
    /// Create a cache over `shared`
    ///
    /// With `disable_shared_cache` set, `shared` is ignored in favour of a
    /// cache that stores nothing.
    pub fn new(
        config: TransactionalCacheConfig,
        shared: Arc<SharedStore<K, V>>,
        tenants: Arc<dyn TenantResolver>,
    ) -> Arc<Self> {
        let shared: Arc<SharedStore<K, V>> = if config.disable_shared_cache {
            debug!(cache = %config.name, "shared cache disabled, using no-op store");
            Arc::new(NullCache::new(config.name.clone()))
        } else {
            shared
        };

        Arc::new_cyclic(|weak_self| Self {
            config,
            shared,
            tenants,
            txn_data: DashMap::new(),
            weak_self: weak_self.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub const fn config(&self) -> &TransactionalCacheConfig {
        &self.config
    }

    /// Number of transactions currently holding local state in this cache
    pub fn active_transactions(&self) -> usize {
        self.txn_data.len()
    }

    const fn policy(&self) -> CommitPolicy {
        CommitPolicy {
            mutable: self.config.mutable,
            allow_equals_checks: self.config.allow_equals_checks,
        }
    }

    // ---------------------------------------------------------------------
    // Public operations
    // ---------------------------------------------------------------------

    /// Read a value
    ///
    /// Inside a transaction: removed keys read as absent, staged values are
    /// returned as staged, and the shared result (hit or miss) is memoized so
    /// that later reads of the key repeat it. With a pending clear or shared reads disabled,
    /// unknown keys read as absent without consulting the shared cache.
    pub fn get(&self, txn: Option<&Transaction>, key: &K) -> CacheResult<Option<V>> {
        let key = self.cache_key(key.clone());
        match self.scope(txn) {
            Scope::Shared | Scope::Closed(_) => self.read_shared(&key),
            Scope::Open(txn) => self.with_data(txn, |data| {
                if data.closed {
                    return self.read_shared(&key);
                }
                if data.is_removed(&key) {
                    return Ok(None);
                }
                if let Some(bucket) = data.bucket(&key) {
                    return Ok(Some(bucket.value().clone()));
                }
                if data.clear_pending || data.ignore_shared_reads || data.is_missed(&key) {
                    return Ok(None);
                }
                let Some(observed) = self.shared.get(&key)? else {
                    data.memoize_miss(key);
                    return Ok(None);
                };
                let value = observed.value().clone();
                data.memoize_read(key, CacheBucket::Read { observed });
                Ok(Some(value))
            }),
        }
    }

    /// Store a value
    ///
    /// Inside a transaction the value is staged. The shared entry seen now
    /// (or seen by an earlier read of the key in this transaction) becomes
    /// the baseline that post-commit compares against.
    pub fn put(&self, txn: Option<&Transaction>, key: K, value: V) -> CacheResult<()> {
        let key = self.cache_key(key);
        match self.scope(txn) {
            Scope::Shared => {
                self.shared.put(key, ValueWrapper::new(value))?;
                Ok(())
            }
            Scope::Closed(id) => {
                self.ignore_late_call(id, "put", &key);
                Ok(())
            }
            Scope::Open(txn) => self.with_data(txn, |data| {
                if data.closed {
                    self.ignore_late_call(txn.id(), "put", &key);
                    return Ok(());
                }
                if data.is_locked(&key) {
                    trace!(cache = %self.name(), key = %key, "put ignored for locked key");
                    return Ok(());
                }

                let bucket = match data.bucket(&key) {
                    Some(CacheBucket::New { .. }) => CacheBucket::New { value },
                    Some(
                        CacheBucket::Update { original: observed, .. }
                        | CacheBucket::Read { observed },
                    ) => CacheBucket::Update { original: observed.clone(), value },
                    None if data.clear_pending
                        || data.ignore_shared_reads
                        || data.is_missed(&key) =>
                    {
                        CacheBucket::New { value }
                    }
                    None => match self.shared.get(&key)? {
                        Some(original) => CacheBucket::Update { original, value },
                        None => CacheBucket::New { value },
                    },
                };

                if data.stage_update(key, bucket) == Staged::Overflowed {
                    self.warn_capacity(txn.id(), "updated");
                }
                Ok(())
            }),
        }
    }

    /// Remove a value
    ///
    /// Inside a transaction the removal is applied to the shared cache at
    /// commit and also at rollback.
    pub fn remove(&self, txn: Option<&Transaction>, key: &K) -> CacheResult<()> {
        let key = self.cache_key(key.clone());
        match self.scope(txn) {
            Scope::Shared => {
                self.shared.remove(&key)?;
                Ok(())
            }
            Scope::Closed(id) => {
                self.ignore_late_call(id, "remove", &key);
                Ok(())
            }
            Scope::Open(txn) => self.with_data(txn, |data| {
                if data.closed {
                    self.ignore_late_call(txn.id(), "remove", &key);
                    return Ok(());
                }
                if data.is_locked(&key) {
                    trace!(cache = %self.name(), key = %key, "remove ignored for locked key");
                    return Ok(());
                }
                if data.stage_removal(key) == Staged::Overflowed {
                    self.warn_capacity(txn.id(), "removed");
                }
                Ok(())
            }),
        }
    }

    /// Clear the cache
    ///
    /// Outside a transaction the whole shared cache is cleared immediately.
    /// Inside one, local changes are discarded and the shared cache is
    /// cleared at commit or rollback. Locks are kept.
    pub fn clear(&self, txn: Option<&Transaction>) -> CacheResult<()> {
        match self.scope(txn) {
            Scope::Shared => {
                self.shared.clear()?;
                Ok(())
            }
            Scope::Closed(id) => {
                debug!(cache = %self.name(), txn = %id, "clear ignored after pre-commit");
                Ok(())
            }
            Scope::Open(txn) => self.with_data(txn, |data| {
                if data.closed {
                    debug!(cache = %self.name(), txn = %txn.id(), "clear ignored after pre-commit");
                } else {
                    data.stage_clear();
                }
                Ok(())
            }),
        }
    }

    /// Whether `get` would find a value, without memoizing a read
    pub fn contains(&self, txn: Option<&Transaction>, key: &K) -> CacheResult<bool> {
        let key = self.cache_key(key.clone());
        match self.scope(txn) {
            Scope::Shared | Scope::Closed(_) => Ok(self.shared.contains(&key)?),
            Scope::Open(txn) => self.with_data(txn, |data| {
                if data.closed {
                    return Ok(self.shared.contains(&key)?);
                }
                if data.is_removed(&key) {
                    return Ok(false);
                }
                if data.bucket(&key).is_some() {
                    return Ok(true);
                }
                if data.clear_pending || data.ignore_shared_reads || data.is_missed(&key) {
                    return Ok(false);
                }
                Ok(self.shared.contains(&key)?)
            }),
        }
    }

    /// Keys visible to the caller's tenant
    ///
    /// Inside a transaction: shared keys (unless a clear is pending) plus
    /// staged keys, minus staged removals and keys that already missed.
    pub fn keys(&self, txn: Option<&Transaction>) -> CacheResult<Vec<K>> {
        let tenant = self.tenants.current_tenant_domain();
        let shared_keys = |include: bool| -> CacheResult<Vec<CacheKey<K>>> {
            if include {
                Ok(self.shared.keys()?)
            } else {
                Ok(Vec::new())
            }
        };

        let visible: Vec<CacheKey<K>> = match self.scope(txn) {
            Scope::Shared | Scope::Closed(_) => shared_keys(true)?,
            Scope::Open(txn) => self.with_data(txn, |data| {
                if data.closed {
                    return shared_keys(true);
                }
                let mut seen = HashSet::new();
                let mut keys = Vec::new();
                let local = data.buckets().map(|(key, _)| key.clone());
                for key in shared_keys(!data.clear_pending)?.into_iter().chain(local) {
                    if !data.is_removed(&key) && !data.is_missed(&key) && seen.insert(key.clone()) {
                        keys.push(key);
                    }
                }
                Ok(keys)
            })?,
        };

        Ok(visible
            .into_iter()
            .filter(|key| self.in_tenant_region(key, &tenant))
            .map(CacheKey::into_inner)
            .collect())
    }

    /// Pin a key for the rest of the transaction; puts and removes of a
    /// pinned key are ignored. No effect outside a transaction.
    pub fn lock_value(&self, txn: Option<&Transaction>, key: &K) {
        if let Scope::Open(txn) = self.scope(txn) {
            let key = self.cache_key(key.clone());
            self.with_data(txn, |data| data.lock(key));
        }
    }

    pub fn unlock_value(&self, txn: Option<&Transaction>, key: &K) {
        if let Scope::Open(txn) = self.scope(txn) {
            let key = self.cache_key(key.clone());
            if let Some(mut data) = self.txn_data.get_mut(&txn.id()) {
                data.unlock(&key);
            }
        }
    }

    pub fn is_value_locked(&self, txn: Option<&Transaction>, key: &K) -> bool {
        match self.scope(txn) {
            Scope::Open(txn) => {
                let key = self.cache_key(key.clone());
                self.txn_data.get(&txn.id()).is_some_and(|data| data.is_locked(&key))
            }
            Scope::Shared | Scope::Closed(_) => false,
        }
    }

    /// Make every shared read in this transaction miss
    ///
    /// Used by transactions that must recompute values from source.
    pub fn set_ignore_shared_cache_reads(&self, txn: &Transaction, ignore: bool) {
        if let Scope::Open(txn) = self.scope(Some(txn)) {
            self.with_data(txn, |data| data.ignore_shared_reads = ignore);
        }
    }

    /// Current shared value for the caller's tenant, bypassing any
    /// transaction
    pub fn shared_value(&self, key: &K) -> CacheResult<Option<V>> {
        self.read_shared(&self.cache_key(key.clone()))
    }

    /// Write straight to the shared cache, bypassing any transaction
    pub fn put_shared_value(&self, key: K, value: V) -> CacheResult<()> {
        self.shared.put(self.cache_key(key), ValueWrapper::new(value))?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn scope<'a>(&self, txn: Option<&'a Transaction>) -> Scope<'a> {
        match txn {
            None => Scope::Shared,
            Some(txn) if txn.is_active() => Scope::Open(txn),
            Some(txn) => Scope::Closed(txn.id()),
        }
    }

    fn cache_key(&self, key: K) -> CacheKey<K> {
        if !self.config.tenant_aware {
            return CacheKey::Plain(key);
        }
        let tenant = self.tenants.current_tenant_domain();
        if is_default_tenant(&tenant) {
            CacheKey::Plain(key)
        } else {
            CacheKey::Region(RegionKey::new(tenant, key))
        }
    }

    fn in_tenant_region(&self, key: &CacheKey<K>, tenant: &str) -> bool {
        if !self.config.tenant_aware {
            return true;
        }
        match key.tenant() {
            None => is_default_tenant(tenant),
            Some(owner) => owner == tenant,
        }
    }

    fn read_shared(&self, key: &CacheKey<K>) -> CacheResult<Option<V>> {
        Ok(self.shared.get(key)?.map(ValueWrapper::into_value))
    }

    /// Run `work` on this transaction's data, creating it and binding this
    /// cache to the transaction on first use
    fn with_data<R>(
        &self,
        txn: &Transaction,
        work: impl FnOnce(&mut TransactionData<K, V>) -> R,
    ) -> R {
        let mut created = false;
        let result = {
            let mut entry = self.txn_data.entry(txn.id()).or_insert_with(|| {
                created = true;
                TransactionData::new(self.config.max_cache_size, txn.is_read_only())
            });
            work(entry.value_mut())
        };
        if created {
            if let Some(this) = self.weak_self.upgrade() {
                txn.bind_listener(this);
            }
            trace!(cache = %self.name(), txn = %txn.id(), "transaction data bound");
        }
        result
    }

    fn ignore_late_call(&self, txn: TxnId, operation: &str, key: &CacheKey<K>) {
        debug!(
            cache = %self.name(),
            txn = %txn,
            key = %key,
            operation,
            "ignoring change after the transaction's cache state was closed"
        );
    }

    fn warn_capacity(&self, txn: TxnId, buffer: &str) {
        warn!(
            cache = %self.name(),
            txn = %txn,
            buffer,
            max_cache_size = self.config.max_cache_size,
            "transactional cache is full; the shared cache will be cleared at commit"
        );
    }

    /// Apply the pending clear, or each pending removal, to the shared cache
    fn apply_invalidations(&self, data: &TransactionData<K, V>) -> Result<(), CommonError> {
        if data.clear_pending {
            trace!(cache = %self.name(), "clearing shared cache");
            return self.shared.clear();
        }
        for key in data.removed_keys() {
            self.shared.remove(key)?;
        }
        Ok(())
    }

    fn flush_bucket(&self, key: CacheKey<K>, bucket: CacheBucket<V>) -> CacheResult<()> {
        let shared = self.shared.get(&key).map_err(|source| {
            self.flush_error(&key, bucket.value(), None, source)
        })?;

        let action = bucket.resolve(shared.as_ref(), self.policy());
        trace!(cache = %self.name(), key = %key, ?action, "post-commit decision");
        match action {
            PostCommitAction::Keep => Ok(()),
            PostCommitAction::Remove => self
                .shared
                .remove(&key)
                .map_err(|source| self.flush_error(&key, bucket.value(), shared.as_ref(), source)),
            PostCommitAction::Write => {
                let value = bucket.into_value();
                let wrapper = ValueWrapper::new(value);
                let attempt = wrapper.clone();
                self.shared.put(key.clone(), attempt).map_err(|source| {
                    self.flush_error(&key, wrapper.value(), shared.as_ref(), source)
                })
            }
        }
    }

    fn flush_error(
        &self,
        key: &CacheKey<K>,
        new_value: &V,
        shared: Option<&ValueWrapper<V>>,
        source: CommonError,
    ) -> CacheError {
        CacheError::PostCommitFlush {
            cache: self.name().to_string(),
            key: key.to_string(),
            new_value: format!("{new_value:?}"),
            shared_value: format!("{:?}", shared.map(ValueWrapper::value)),
            source,
        }
    }
}

impl<K, V> TransactionListener for TransactionalCache<K, V>
where
    K: CacheKeyType,
    V: CacheValueType,
{
    fn before_commit(&self, txn: &Transaction, read_only: bool) -> CacheResult<()> {
        let Some(mut data) = self.txn_data.get_mut(&txn.id()) else {
            return Ok(());
        };
        if data.closed {
            return Ok(());
        }
        trace!(
            cache = %self.name(),
            txn = %txn.id(),
            read_only,
            local_read_only = data.read_only,
            clear_pending = data.clear_pending,
            "pre-commit"
        );

        self.apply_invalidations(&data)?;
        for (_, bucket) in data.buckets() {
            bucket.pre_commit();
        }
        data.closed = true;
        Ok(())
    }

    fn after_commit(&self, txn: &Transaction) -> CacheResult<()> {
        let Some((_, data)) = self.txn_data.remove(&txn.id()) else {
            return Ok(());
        };

        self.apply_invalidations(&data)?;
        for (key, bucket) in data.into_buckets() {
            if bucket.is_flushable() {
                self.flush_bucket(key, bucket)?;
            }
        }
        trace!(cache = %self.name(), txn = %txn.id(), "post-commit complete");
        Ok(())
    }

    fn after_rollback(&self, txn: &Transaction) {
        let Some((_, data)) = self.txn_data.remove(&txn.id()) else {
            return;
        };
        if let Err(err) = self.apply_invalidations(&data) {
            error!(
                cache = %self.name(),
                txn = %txn.id(),
                error_kind = err.kind(),
                error = %err,
                "failed to apply removals after rollback"
            );
        }
    }
}

impl<K, V> Debug for TransactionalCache<K, V>
where
    K: CacheKeyType,
    V: CacheValueType,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionalCache")
            .field("name", &self.config.name)
            .field("shared", &self.shared.name())
            .field("active_transactions", &self.txn_data.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the transactional cache commit protocol.
    use repocache_common::cache::{CacheConfig, MemoryCache};

    use super::*;
    use crate::tenant::{FixedTenantResolver, ThreadTenantResolver};
    use crate::transaction::{TransactionManager, TxnReadState};

    type TestCache = Arc<TransactionalCache<&'static str, i32>>;

    fn cache_with(config: TransactionalCacheConfig) -> TestCache {
        let shared: Arc<MemoryCache<CacheKey<&'static str>, ValueWrapper<i32>>> =
            Arc::new(MemoryCache::new(CacheConfig::unbounded(config.name.clone())));
        TransactionalCache::new(config, shared, Arc::new(FixedTenantResolver::default_tenant()))
    }

    fn cache() -> TestCache {
        cache_with(TransactionalCacheConfig::new("test"))
    }

    /// Validates repeatable reads inside a transaction.
    ///
    /// Assertions:
    /// - Confirms a second read repeats the first even after a foreign write.
    /// - Confirms the memoized read is not written back at commit.
    #[test]
    fn test_repeatable_read() {
        let cache = cache();
        let txns = TransactionManager::new();
        cache.put_shared_value("a", 1).unwrap();

        let txn = txns.begin(TxnReadState::ReadWrite);
        assert_eq!(cache.get(Some(&txn), &"a").unwrap(), Some(1));
        cache.put_shared_value("a", 2).unwrap();
        assert_eq!(cache.get(Some(&txn), &"a").unwrap(), Some(1));
        txn.commit().unwrap();

        assert_eq!(cache.shared_value(&"a").unwrap(), Some(2));
        assert_eq!(cache.active_transactions(), 0);
    }

    /// Validates that a concurrent write invalidates instead of being
    /// overwritten.
    #[test]
    fn test_conflicting_update_invalidates() {
        let cache = cache();
        let txns = TransactionManager::new();
        cache.put_shared_value("a", 1).unwrap();

        let txn = txns.begin(TxnReadState::ReadWrite);
        cache.put(Some(&txn), "a", 10).unwrap();
        cache.put_shared_value("a", 5).unwrap();
        txn.commit().unwrap();

        assert_eq!(cache.shared_value(&"a").unwrap(), None);
    }

    /// Validates that an unchallenged update is written at commit.
    #[test]
    fn test_update_written_on_commit() {
        let cache = cache();
        let txns = TransactionManager::new();
        cache.put_shared_value("a", 1).unwrap();

        let txn = txns.begin(TxnReadState::ReadWrite);
        assert_eq!(cache.get(Some(&txn), &"a").unwrap(), Some(1));
        cache.put(Some(&txn), "a", 2).unwrap();
        assert_eq!(cache.shared_value(&"a").unwrap(), Some(1));
        txn.commit().unwrap();

        assert_eq!(cache.shared_value(&"a").unwrap(), Some(2));
    }

    /// Validates rollback behaviour.
    ///
    /// Assertions:
    /// - Confirms staged updates are discarded.
    /// - Confirms staged removals still reach the shared cache.
    #[test]
    fn test_rollback_applies_only_removals() {
        let cache = cache();
        let txns = TransactionManager::new();
        cache.put_shared_value("a", 1).unwrap();
        cache.put_shared_value("b", 2).unwrap();

        let txn = txns.begin(TxnReadState::ReadWrite);
        cache.put(Some(&txn), "a", 10).unwrap();
        cache.remove(Some(&txn), &"b").unwrap();
        assert_eq!(cache.get(Some(&txn), &"b").unwrap(), None);
        txn.rollback().unwrap();

        assert_eq!(cache.shared_value(&"a").unwrap(), Some(1));
        assert_eq!(cache.shared_value(&"b").unwrap(), None);
    }

    /// Validates that locked keys ignore puts and removes.
    #[test]
    fn test_locked_value_ignores_changes() {
        let cache = cache();
        let txns = TransactionManager::new();
        cache.put_shared_value("a", 1).unwrap();

        let txn = txns.begin(TxnReadState::ReadWrite);
        cache.lock_value(Some(&txn), &"a");
        assert!(cache.is_value_locked(Some(&txn), &"a"));
        cache.put(Some(&txn), "a", 10).unwrap();
        cache.remove(Some(&txn), &"a").unwrap();
        assert_eq!(cache.get(Some(&txn), &"a").unwrap(), Some(1));

        cache.unlock_value(Some(&txn), &"a");
        cache.put(Some(&txn), "a", 10).unwrap();
        assert_eq!(cache.get(Some(&txn), &"a").unwrap(), Some(10));
        txn.commit().unwrap();
        assert_eq!(cache.shared_value(&"a").unwrap(), Some(10));
    }

    /// Validates that a completed transaction no longer stages changes.
    #[test]
    fn test_calls_after_completion_hit_shared() {
        let cache = cache();
        let txns = TransactionManager::new();
        let txn = txns.begin(TxnReadState::ReadWrite);
        txn.commit().unwrap();

        cache.put_shared_value("a", 1).unwrap();
        cache.put(Some(&txn), "a", 99).unwrap();
        cache.remove(Some(&txn), &"a").unwrap();
        assert_eq!(cache.get(Some(&txn), &"a").unwrap(), Some(1));
        assert_eq!(cache.active_transactions(), 0);
    }

    /// Validates tenant scoping of keys.
    ///
    /// Assertions:
    /// - Confirms two tenants never see each other's entries.
    /// - Confirms `keys` only lists the caller's region.
    #[test]
    fn test_tenant_regions() {
        let shared: Arc<MemoryCache<CacheKey<&'static str>, ValueWrapper<i32>>> =
            Arc::new(MemoryCache::new(CacheConfig::unbounded("regions")));
        let cache = TransactionalCache::new(
            TransactionalCacheConfig::new("regions"),
            shared,
            Arc::new(ThreadTenantResolver),
        );

        cache.put_shared_value("k", 0).unwrap();
        ThreadTenantResolver::run_as("acme.com", || {
            assert_eq!(cache.shared_value(&"k").unwrap(), None);
            cache.put_shared_value("k", 1).unwrap();
            assert_eq!(cache.keys(None).unwrap(), vec!["k"]);
        });
        ThreadTenantResolver::run_as("globex.com", || {
            assert_eq!(cache.shared_value(&"k").unwrap(), None);
            assert!(cache.keys(None).unwrap().is_empty());
        });
        assert_eq!(cache.shared_value(&"k").unwrap(), Some(0));
        assert_eq!(cache.keys(None).unwrap(), vec!["k"]);
    }

    /// Validates that a disabled shared cache stores nothing across
    /// transactions.
    #[test]
    fn test_disabled_shared_cache() {
        let config = TransactionalCacheConfig::builder("off").disable_shared_cache(true).build();
        let cache = cache_with(config);
        let txns = TransactionManager::new();

        let txn = txns.begin(TxnReadState::ReadWrite);
        cache.put(Some(&txn), "a", 1).unwrap();
        assert_eq!(cache.get(Some(&txn), &"a").unwrap(), Some(1));
        txn.commit().unwrap();
        assert_eq!(cache.shared_value(&"a").unwrap(), None);
    }
}
