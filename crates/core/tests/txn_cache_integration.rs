//! Integration tests for the transactional cache
//!
//! Exercises isolation, commit propagation, conflict handling, rollback and
//! tenant scoping through the public API, with an in-process shared cache
//! and a shared cache whose writes can be made to fail.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use repocache_common::cache::{CacheConfig, MemoryCache, SharedCache};
use repocache_common::error::{CommonError, CommonResult};
use repocache_core::config::TransactionalCacheConfig;
use repocache_core::tenant::{FixedTenantResolver, ThreadTenantResolver};
use repocache_core::transaction::{TransactionManager, TxnReadState, TxnStatus};
use repocache_core::txn_cache::{CacheKey, TransactionalCache, ValueWrapper};
use repocache_core::CacheError;

type Store<V> = MemoryCache<CacheKey<String>, ValueWrapper<V>>;

fn store<V: Clone + Send + Sync>(name: &str) -> Arc<Store<V>> {
    Arc::new(MemoryCache::new(CacheConfig::unbounded(name)))
}

fn cache_with(config: TransactionalCacheConfig) -> Arc<TransactionalCache<String, i64>> {
    let shared = store::<i64>(&config.name);
    TransactionalCache::new(config, shared, Arc::new(FixedTenantResolver::default_tenant()))
}

fn cache() -> Arc<TransactionalCache<String, i64>> {
    cache_with(TransactionalCacheConfig::new("nodeCache"))
}

fn key(k: &str) -> String {
    k.to_string()
}

fn sorted_keys(cache: &TransactionalCache<String, i64>) -> Vec<String> {
    let mut keys = cache.keys(None).unwrap();
    keys.sort();
    keys
}

/// Validates repeatable reads while another thread commits a change.
///
/// # Test Steps
/// 1. Transaction A reads `k` and sees 1
/// 2. A second thread commits `k = 2` in its own transaction
/// 3. Transaction A reads `k` again and still sees 1
/// 4. After A commits, the shared cache holds the other thread's value
#[test]
fn test_repeatable_read_across_threads() {
    let cache = cache();
    let txns = Arc::new(TransactionManager::new());
    cache.put_shared_value(key("k"), 1).unwrap();

    let txn = txns.begin(TxnReadState::ReadOnly);
    assert_eq!(cache.get(Some(&txn), &key("k")).unwrap(), Some(1));

    {
        let cache = cache.clone();
        let txns = txns.clone();
        thread::spawn(move || {
            let writer = txns.begin(TxnReadState::ReadWrite);
            assert_eq!(cache.get(Some(&writer), &key("k")).unwrap(), Some(1));
            cache.put(Some(&writer), key("k"), 2).unwrap();
            writer.commit().unwrap();
        })
        .join()
        .unwrap();
    }

    assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(2));
    assert_eq!(cache.get(Some(&txn), &key("k")).unwrap(), Some(1));
    txn.commit().unwrap();
    assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(2));
}

/// Validates that a miss is repeatable while another thread commits the key.
///
/// # Test Steps
/// 1. Transaction A reads the absent key `m`
/// 2. A second thread commits `m = 9`
/// 3. Transaction A still reads `m` as absent through `get`, `contains` and
///    `keys`
/// 4. A puts `m = 3`, which is staged as new; at commit the foreign entry
///    cannot be proven safe to overwrite and is invalidated
#[test]
fn test_repeatable_miss_across_threads() {
    let cache = cache();
    let txns = Arc::new(TransactionManager::new());

    let txn = txns.begin(TxnReadState::ReadWrite);
    assert_eq!(cache.get(Some(&txn), &key("m")).unwrap(), None);

    {
        let cache = cache.clone();
        let txns = txns.clone();
        thread::spawn(move || {
            let writer = txns.begin(TxnReadState::ReadWrite);
            cache.put(Some(&writer), key("m"), 9).unwrap();
            writer.commit().unwrap();
        })
        .join()
        .unwrap();
    }

    assert_eq!(cache.shared_value(&key("m")).unwrap(), Some(9));
    assert_eq!(cache.get(Some(&txn), &key("m")).unwrap(), None);
    assert!(!cache.contains(Some(&txn), &key("m")).unwrap());
    assert!(cache.keys(Some(&txn)).unwrap().is_empty());

    cache.put(Some(&txn), key("m"), 3).unwrap();
    assert_eq!(cache.get(Some(&txn), &key("m")).unwrap(), Some(3));
    txn.commit().unwrap();
    assert_eq!(cache.shared_value(&key("m")).unwrap(), None);
}

/// Validates that a transaction sees its own writes and removals first.
///
/// Assertions:
/// - Confirms `put` then `get` returns the put value.
/// - Confirms `remove` then `get` returns `None` even though the shared cache
///   still has the key.
/// - Confirms `contains` and `keys` follow the same precedence.
#[test]
fn test_write_visibility_and_removal_precedence() {
    let cache = cache();
    let txns = TransactionManager::new();
    cache.put_shared_value(key("a"), 1).unwrap();
    cache.put_shared_value(key("b"), 2).unwrap();

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.put(Some(&txn), key("a"), 10).unwrap();
    cache.put(Some(&txn), key("c"), 30).unwrap();
    cache.remove(Some(&txn), &key("b")).unwrap();

    assert_eq!(cache.get(Some(&txn), &key("a")).unwrap(), Some(10));
    assert_eq!(cache.get(Some(&txn), &key("b")).unwrap(), None);
    assert!(!cache.contains(Some(&txn), &key("b")).unwrap());
    assert!(cache.contains(Some(&txn), &key("c")).unwrap());
    assert_eq!(cache.shared_value(&key("b")).unwrap(), Some(2));

    let mut keys = cache.keys(Some(&txn)).unwrap();
    keys.sort();
    assert_eq!(keys, vec!["a", "c"]);

    // A put after a remove brings the key back.
    cache.put(Some(&txn), key("b"), 20).unwrap();
    assert_eq!(cache.get(Some(&txn), &key("b")).unwrap(), Some(20));
    txn.commit().unwrap();

    assert_eq!(cache.shared_value(&key("a")).unwrap(), Some(10));
    assert_eq!(cache.shared_value(&key("c")).unwrap(), Some(30));
}

/// Validates that an uncontested new value reaches the shared cache on
/// commit and not before.
#[test]
fn test_commit_without_conflict() {
    let cache = cache();
    let txns = TransactionManager::new();

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.put(Some(&txn), key("k"), 1).unwrap();
    assert_eq!(cache.shared_value(&key("k")).unwrap(), None);
    txn.commit().unwrap();

    assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(1));
    assert_eq!(cache.active_transactions(), 0);
}

/// Validates pessimistic invalidation when another transaction committed
/// first.
///
/// # Test Steps
/// 1. Transaction A reads `k` (observing the current wrapper)
/// 2. Transaction B reads `k`, writes it and commits
/// 3. Transaction A writes `k` and commits
/// 4. The shared cache no longer holds `k`
#[test]
fn test_detected_conflict_invalidates() {
    let cache = cache();
    let txns = TransactionManager::new();
    cache.put_shared_value(key("k"), 1).unwrap();

    let a = txns.begin(TxnReadState::ReadWrite);
    assert_eq!(cache.get(Some(&a), &key("k")).unwrap(), Some(1));

    let b = txns.begin(TxnReadState::ReadWrite);
    assert_eq!(cache.get(Some(&b), &key("k")).unwrap(), Some(1));
    cache.put(Some(&b), key("k"), 2).unwrap();
    b.commit().unwrap();
    assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(2));

    cache.put(Some(&a), key("k"), 3).unwrap();
    a.commit().unwrap();
    assert_eq!(cache.shared_value(&key("k")).unwrap(), None);
}

/// Validates that equals checks keep a foreign entry equal to the local
/// value.
#[test]
fn test_equals_check_skips_redundant_invalidation() {
    let cache = cache_with(
        TransactionalCacheConfig::builder("equalsCache").allow_equals_checks(true).build(),
    );
    let txns = TransactionManager::new();
    cache.put_shared_value(key("k"), 1).unwrap();

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.put(Some(&txn), key("k"), 5).unwrap();
    cache.put_shared_value(key("k"), 5).unwrap();
    txn.commit().unwrap();

    assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(5));
}

/// Validates commit rules of immutable caches.
///
/// Assertions:
/// - Confirms a foreign entry is left alone instead of invalidated.
/// - Confirms an update whose shared entry vanished is written back.
#[test]
fn test_immutable_cache_rules() {
    let cache =
        cache_with(TransactionalCacheConfig::builder("immutableCache").mutable(false).build());
    let txns = TransactionManager::new();

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.put(Some(&txn), key("new"), 1).unwrap();
    cache.put_shared_value(key("new"), 7).unwrap();
    txn.commit().unwrap();
    assert_eq!(cache.shared_value(&key("new")).unwrap(), Some(7));

    cache.put_shared_value(key("upd"), 1).unwrap();
    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.put(Some(&txn), key("upd"), 2).unwrap();
    cache.clear(None).unwrap();
    txn.commit().unwrap();
    assert_eq!(cache.shared_value(&key("upd")).unwrap(), Some(2));
}

/// Validates that an update is not resurrected in a mutable cache when the
/// shared entry disappeared meanwhile.
#[test]
fn test_mutable_update_of_vanished_entry_stays_absent() {
    let cache = cache();
    let txns = TransactionManager::new();
    cache.put_shared_value(key("k"), 1).unwrap();

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.put(Some(&txn), key("k"), 2).unwrap();
    cache.remove(None, &key("k")).unwrap();
    txn.commit().unwrap();

    assert_eq!(cache.shared_value(&key("k")).unwrap(), None);
}

/// Validates rollback semantics.
///
/// Assertions:
/// - Confirms a removal issued before rollback still reaches the shared
///   cache.
/// - Confirms a clear issued before rollback still empties it.
/// - Confirms puts never reach the shared cache.
#[test]
fn test_rollback_semantics() {
    let cache = cache();
    let txns = TransactionManager::new();
    cache.put_shared_value(key("a"), 1).unwrap();
    cache.put_shared_value(key("b"), 2).unwrap();

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.remove(Some(&txn), &key("a")).unwrap();
    cache.put(Some(&txn), key("b"), 20).unwrap();
    cache.put(Some(&txn), key("c"), 30).unwrap();
    txn.rollback().unwrap();

    assert_eq!(cache.shared_value(&key("a")).unwrap(), None);
    assert_eq!(cache.shared_value(&key("b")).unwrap(), Some(2));
    assert_eq!(cache.shared_value(&key("c")).unwrap(), None);

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.clear(Some(&txn)).unwrap();
    cache.put(Some(&txn), key("d"), 40).unwrap();
    assert_eq!(cache.shared_value(&key("b")).unwrap(), Some(2));
    drop(txn);

    assert!(sorted_keys(&cache).is_empty());
    assert_eq!(cache.active_transactions(), 0);
}

/// Validates that clearing twice in one transaction equals clearing once.
#[test]
fn test_clear_is_idempotent() {
    let once = cache();
    let twice = cache();
    let txns = TransactionManager::new();

    for (cache, clears) in [(&once, 1), (&twice, 2)] {
        cache.put_shared_value(key("old"), 1).unwrap();
        let txn = txns.begin(TxnReadState::ReadWrite);
        for _ in 0..clears {
            cache.clear(Some(&txn)).unwrap();
        }
        assert_eq!(cache.get(Some(&txn), &key("old")).unwrap(), None);
        cache.put(Some(&txn), key("fresh"), 2).unwrap();
        txn.commit().unwrap();
    }

    assert_eq!(sorted_keys(&once), sorted_keys(&twice));
    assert_eq!(sorted_keys(&once), vec!["fresh"]);
    assert_eq!(twice.shared_value(&key("fresh")).unwrap(), Some(2));
}

/// Validates the soft capacity of the local update buffer.
///
/// With `max_cache_size = 2`, a third put forces a clear of the shared cache
/// at commit; all three values are then written.
#[test]
fn test_capacity_overflow_clears_then_repopulates() {
    let cache =
        cache_with(TransactionalCacheConfig::builder("smallCache").max_cache_size(2).build());
    let txns = TransactionManager::new();
    cache.put_shared_value(key("unrelated"), 9).unwrap();

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.put(Some(&txn), key("a"), 1).unwrap();
    cache.put(Some(&txn), key("b"), 2).unwrap();
    cache.put(Some(&txn), key("c"), 3).unwrap();
    assert_eq!(cache.get(Some(&txn), &key("unrelated")).unwrap(), None);
    txn.commit().unwrap();

    assert_eq!(sorted_keys(&cache), vec!["a", "b", "c"]);
    assert_eq!(cache.shared_value(&key("c")).unwrap(), Some(3));
}

/// Validates that ignoring shared reads hides existing entries and that a
/// blind write over one invalidates it.
#[test]
fn test_ignore_shared_cache_reads() {
    let cache = cache();
    let txns = TransactionManager::new();
    cache.put_shared_value(key("k"), 1).unwrap();

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.set_ignore_shared_cache_reads(&txn, true);
    assert_eq!(cache.get(Some(&txn), &key("k")).unwrap(), None);
    assert!(!cache.contains(Some(&txn), &key("k")).unwrap());
    cache.put(Some(&txn), key("k"), 2).unwrap();
    assert_eq!(cache.get(Some(&txn), &key("k")).unwrap(), Some(2));
    txn.commit().unwrap();

    assert_eq!(cache.shared_value(&key("k")).unwrap(), None);
}

/// Validates that locked keys are immune to put and remove until unlocked.
#[test]
fn test_locked_values() {
    let cache = cache();
    let txns = TransactionManager::new();
    cache.put_shared_value(key("k"), 1).unwrap();

    let txn = txns.begin(TxnReadState::ReadWrite);
    assert!(!cache.is_value_locked(Some(&txn), &key("k")));
    cache.lock_value(Some(&txn), &key("k"));
    cache.remove(Some(&txn), &key("k")).unwrap();
    cache.put(Some(&txn), key("k"), 5).unwrap();
    assert_eq!(cache.get(Some(&txn), &key("k")).unwrap(), Some(1));

    // Locks survive a clear.
    cache.clear(Some(&txn)).unwrap();
    assert!(cache.is_value_locked(Some(&txn), &key("k")));
    txn.commit().unwrap();

    assert!(!cache.is_value_locked(None, &key("k")));
    assert_eq!(cache.shared_value(&key("k")).unwrap(), None);
}

/// Validates that tenants never see each other's entries, inside or outside
/// transactions.
#[test]
fn test_tenant_isolation() {
    let shared = store::<i64>("tenantCache");
    let cache = TransactionalCache::<String, i64>::new(
        TransactionalCacheConfig::new("tenantCache"),
        shared.clone(),
        Arc::new(ThreadTenantResolver),
    );
    let txns = TransactionManager::new();

    ThreadTenantResolver::run_as("acme.com", || {
        let txn = txns.begin(TxnReadState::ReadWrite);
        cache.put(Some(&txn), key("k"), 1).unwrap();
        txn.commit().unwrap();
    });
    ThreadTenantResolver::run_as("globex.com", || {
        let txn = txns.begin(TxnReadState::ReadWrite);
        assert_eq!(cache.get(Some(&txn), &key("k")).unwrap(), None);
        cache.put(Some(&txn), key("k"), 2).unwrap();
        txn.commit().unwrap();
        assert_eq!(cache.keys(None).unwrap(), vec!["k"]);
    });

    assert_eq!(cache.shared_value(&key("k")).unwrap(), None);
    ThreadTenantResolver::run_as("acme.com", || {
        assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(1));
    });
    assert_eq!(shared.len(), 2);
}

/// Validates that caches without tenant awareness share keys across tenants.
#[test]
fn test_tenant_unaware_cache_shares_keys() {
    let cache = TransactionalCache::<String, i64>::new(
        TransactionalCacheConfig::builder("globalCache").tenant_aware(false).build(),
        store::<i64>("globalCache"),
        Arc::new(ThreadTenantResolver),
    );
    ThreadTenantResolver::run_as("acme.com", || cache.put_shared_value(key("k"), 1).unwrap());
    assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(1));
}

/// Validates that a stored `None` is a value, distinct from a miss.
#[test]
fn test_null_values() {
    let cache = TransactionalCache::<String, Option<i64>>::new(
        TransactionalCacheConfig::new("nullableCache"),
        store::<Option<i64>>("nullableCache"),
        Arc::new(FixedTenantResolver::default_tenant()),
    );
    let txns = TransactionManager::new();

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.put(Some(&txn), key("k"), None).unwrap();
    assert_eq!(cache.get(Some(&txn), &key("k")).unwrap(), Some(None));
    assert_eq!(cache.get(Some(&txn), &key("missing")).unwrap(), None);
    txn.commit().unwrap();

    assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(None));
}

/// Shared cache whose writes fail on demand
struct FailingCache {
    inner: Store<i64>,
    fail_puts: AtomicBool,
}

impl SharedCache<CacheKey<String>, ValueWrapper<i64>> for FailingCache {
    fn name(&self) -> &str {
        "failingCache"
    }

    fn get(&self, key: &CacheKey<String>) -> CommonResult<Option<ValueWrapper<i64>>> {
        self.inner.get(key)
    }

    fn put(&self, key: CacheKey<String>, value: ValueWrapper<i64>) -> CommonResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(CommonError::backend("failingCache", "value is not serializable", false));
        }
        self.inner.put(key, value)
    }

    fn remove(&self, key: &CacheKey<String>) -> CommonResult<()> {
        self.inner.remove(key)
    }

    fn clear(&self) -> CommonResult<()> {
        self.inner.clear()
    }

    fn keys(&self) -> CommonResult<Vec<CacheKey<String>>> {
        self.inner.keys()
    }
}

/// Validates that a failed post-commit write surfaces as a transaction
/// failure carrying diagnostics.
///
/// Assertions:
/// - Confirms `commit()` returns `PostCommitFlush`.
/// - Confirms the error names the cache, the key and both values.
/// - Confirms the transaction still counts as committed.
#[test]
fn test_post_commit_flush_failure() {
    let failing = Arc::new(FailingCache {
        inner: MemoryCache::new(CacheConfig::unbounded("failingCache")),
        fail_puts: AtomicBool::new(true),
    });
    let cache = TransactionalCache::<String, i64>::new(
        TransactionalCacheConfig::new("failingCache"),
        failing.clone(),
        Arc::new(FixedTenantResolver::default_tenant()),
    );
    let txns = TransactionManager::new();

    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.put(Some(&txn), key("k"), 7).unwrap();
    let err = txn.commit().unwrap_err();

    match &err {
        CacheError::PostCommitFlush { cache, key, new_value, shared_value, .. } => {
            assert_eq!(cache, "failingCache");
            assert_eq!(key, "\"k\"");
            assert_eq!(new_value, "7");
            assert_eq!(shared_value, "None");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(txn.status(), TxnStatus::Committed);
    assert_eq!(cache.active_transactions(), 0);

    failing.fail_puts.store(false, Ordering::SeqCst);
    let txn = txns.begin(TxnReadState::ReadWrite);
    cache.put(Some(&txn), key("k"), 8).unwrap();
    txn.commit().unwrap();
    assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(8));
}

/// Validates `do_in_transaction` against the cache.
#[test]
fn test_do_in_transaction() {
    let cache = cache();
    let txns = TransactionManager::new();

    let value = txns
        .do_in_transaction(TxnReadState::ReadWrite, |txn| -> Result<i64, CacheError> {
            cache.put(Some(txn), key("k"), 3)?;
            Ok(cache.get(Some(txn), &key("k"))?.unwrap_or_default())
        })
        .unwrap();
    assert_eq!(value, 3);
    assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(3));

    let failed: Result<(), CacheError> = txns.do_in_transaction(TxnReadState::ReadWrite, |txn| {
        cache.put(Some(txn), key("k"), 4)?;
        Err(CacheError::UnknownCache("abort".into()))
    });
    assert!(failed.is_err());
    assert_eq!(cache.shared_value(&key("k")).unwrap(), Some(3));
}

/// Validates isolation between transactions issued by different managers.
///
/// Assertions:
/// - Confirms neither transaction sees the other's uncommitted put.
/// - Confirms the cache binds to both transactions.
/// - Confirms each commit publishes only its own change.
#[test]
fn test_isolation_across_transaction_managers() {
    let cache = cache();
    let first = TransactionManager::new();
    let second = TransactionManager::new();

    let a = first.begin(TxnReadState::ReadWrite);
    let b = second.begin(TxnReadState::ReadWrite);
    assert_eq!(a.id().sequence(), b.id().sequence());

    cache.put(Some(&a), key("x"), 1).unwrap();
    assert_eq!(cache.get(Some(&b), &key("x")).unwrap(), None);
    cache.put(Some(&b), key("y"), 2).unwrap();
    assert_eq!(cache.get(Some(&a), &key("y")).unwrap(), None);

    assert_eq!(cache.active_transactions(), 2);
    assert_eq!(a.listener_count(), 1);
    assert_eq!(b.listener_count(), 1);

    a.commit().unwrap();
    assert_eq!(cache.shared_value(&key("x")).unwrap(), Some(1));
    assert_eq!(cache.shared_value(&key("y")).unwrap(), None);
    b.rollback().unwrap();
    assert_eq!(cache.shared_value(&key("y")).unwrap(), None);
    assert_eq!(cache.active_transactions(), 0);
}

/// Validates concurrent transactions writing disjoint keys.
#[test]
fn test_concurrent_disjoint_transactions() {
    const THREADS: usize = 8;
    let cache = cache();
    let txns = Arc::new(TransactionManager::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let cache = cache.clone();
            let txns = txns.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let txn = txns.begin(TxnReadState::ReadWrite);
                cache.put(Some(&txn), format!("key-{i}"), i as i64).unwrap();
                barrier.wait();
                txn.commit().unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(sorted_keys(&cache).len(), THREADS);
    assert_eq!(cache.shared_value(&key("key-3")).unwrap(), Some(3));
    assert_eq!(cache.active_transactions(), 0);
}
