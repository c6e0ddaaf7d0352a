//! Per-tenant cache values rebuilt in the background
//!
//! An [`AsyncRefreshCache`] holds one value per tenant, produced by a
//! [`CacheBuilder`]. Stale or missing values are queued for rebuild and the
//! rebuilds run on a [`RefreshExecutor`]:
//!
//! - requests for a tenant are coalesced: the queue holds at most one
//!   [`Refresh`] per tenant, and every caller blocked on a tenant wakes when
//!   that refresh completes
//! - at most one worker task is scheduled or running per cache; it rebuilds
//!   one tenant and reschedules itself while work remains
//! - a failed rebuild goes back to the queue and is retried after
//!   `retry_delay`; callers never see the failure
//!
//! Locks are always taken in the order run state, queue, live values, and
//! never around a rebuild.

mod event;
mod executor;
mod state;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use repocache_common::utils::saturating_millis as millis;
use tracing::{debug, error, info, trace, warn};

pub use event::{
    LocalRefreshRegistry, RefreshEventKind, RefreshableCacheEvent, RefreshableCacheListener,
    RefreshableCacheRegistry,
};
pub use executor::{InlineExecutor, RefreshExecutor, RefreshJob, ThreadPoolExecutor};
pub use state::{Refresh, RefreshState, RunState};

use crate::config::RefreshSettings;
use crate::error::{CacheError, CacheResult};
use crate::transaction::{Transaction, TransactionListener, TxnId};

/// Produces the value of one tenant
///
/// Implemented for any `Fn(&str) -> anyhow::Result<T>`.
pub trait CacheBuilder<T>: Send + Sync {
    fn build_cache(&self, tenant: &str) -> anyhow::Result<T>;
}

impl<T, F> CacheBuilder<T> for F
where
    F: Fn(&str) -> anyhow::Result<T> + Send + Sync,
{
    fn build_cache(&self, tenant: &str) -> anyhow::Result<T> {
        self(tenant)
    }
}

/// Refresh work deferred until a transaction commits
#[derive(Debug, Default)]
struct PendingRefreshes {
    /// Tenants to announce to the registry
    broadcast: BTreeSet<String>,
    /// Tenants to queue on this cache directly
    queue: BTreeSet<String>,
}

impl PendingRefreshes {
    fn contains(&self, tenant: &str) -> bool {
        self.broadcast.contains(tenant) || self.queue.contains(tenant)
    }
}

/// A per-tenant value rebuilt asynchronously
pub struct AsyncRefreshCache<T>
where
    T: Send + Sync + 'static,
{
    cache_id: String,
    builder: Arc<dyn CacheBuilder<T>>,
    executor: Arc<dyn RefreshExecutor>,
    registry: Arc<dyn RefreshableCacheRegistry>,
    retry_delay: Duration,
    run_state: RwLock<RunState>,
    queue: RwLock<VecDeque<Arc<Refresh>>>,
    live: RwLock<HashMap<String, Arc<T>>>,
    pending: DashMap<TxnId, PendingRefreshes>,
    stopped: AtomicBool,
    weak_self: Weak<Self>,
}

impl<T> AsyncRefreshCache<T>
where
    T: Send + Sync + 'static,
{
    /// Create the cache and register it with `registry`
    pub fn new(
        cache_id: impl Into<String>,
        builder: Arc<dyn CacheBuilder<T>>,
        executor: Arc<dyn RefreshExecutor>,
        registry: Arc<dyn RefreshableCacheRegistry>,
        settings: &RefreshSettings,
    ) -> Arc<Self> {
        let cache = Arc::new_cyclic(|weak_self| Self {
            cache_id: cache_id.into(),
            builder,
            executor,
            registry,
            retry_delay: settings.retry_delay,
            run_state: RwLock::new(RunState::Idle),
            queue: RwLock::new(VecDeque::new()),
            live: RwLock::new(HashMap::new()),
            pending: DashMap::new(),
            stopped: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        });

        let listener: Arc<dyn RefreshableCacheListener> = cache.clone();
        cache.registry.register(Arc::downgrade(&listener));
        info!(cache_id = %cache.cache_id, "refreshable cache registered");
        cache
    }

    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }

    pub fn run_state(&self) -> RunState {
        *self.run_state.read()
    }

    /// Tenants that currently have a published value
    pub fn live_tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = self.live.read().keys().cloned().collect();
        tenants.sort();
        tenants
    }

    /// Tenants with a refresh waiting or running, in queue order
    pub fn queued_tenants(&self) -> Vec<String> {
        self.queue.read().iter().map(|refresh| refresh.tenant().to_string()).collect()
    }

    /// Return the tenant's value, blocking until a rebuild publishes one if
    /// none is live
    ///
    /// Concurrent callers for the same tenant share a single rebuild. The
    /// wait has no timeout and cannot be cancelled.
    pub fn get(&self, tenant: &str) -> CacheResult<Arc<T>> {
        loop {
            if let Some(value) = self.live.read().get(tenant).cloned() {
                return Ok(value);
            }
            if self.is_stopped() {
                return Err(CacheError::RefreshStopped(self.cache_id.clone()));
            }

            let Some(refresh) = self.enqueue_missing(tenant) else {
                continue;
            };
            self.submit()?;
            trace!(cache_id = %self.cache_id, tenant, "waiting for rebuild");
            refresh.wait_done();
        }
    }

    /// Request a rebuild of the tenant's value without waiting for it
    ///
    /// Inside an active transaction the request is announced only after the
    /// transaction commits and is dropped if it rolls back.
    pub fn refresh(&self, txn: Option<&Transaction>, tenant: &str) {
        match txn.filter(|txn| txn.is_active()) {
            Some(txn) => {
                self.defer(txn, |pending| {
                    pending.broadcast.insert(tenant.to_string());
                });
                trace!(cache_id = %self.cache_id, tenant, txn = %txn.id(), "refresh deferred to commit");
            }
            None => self.broadcast_refresh(tenant),
        }
    }

    /// Whether the tenant's value has no rebuild pending
    ///
    /// Inside a transaction, refreshes deferred by that transaction count as
    /// pending.
    pub fn is_up_to_date(&self, txn: Option<&Transaction>, tenant: &str) -> bool {
        if let Some(txn) = txn {
            if self.pending.get(&txn.id()).is_some_and(|pending| pending.contains(tenant)) {
                return false;
            }
        }
        !self.queue.read().iter().any(|refresh| {
            refresh.tenant() == tenant
                && matches!(refresh.state(), RefreshState::Waiting | RefreshState::Running)
        })
    }

    /// Rebuild and publish the tenant's value on the calling thread
    ///
    /// Used by a transaction that must see its own uncommitted changes in
    /// the cached value. Bypasses the queue.
    pub fn force_in_changes_for_this_uncommitted_transaction(&self, tenant: &str) -> CacheResult<Arc<T>> {
        let started = Instant::now();
        let value = self.builder.build_cache(tenant).map_err(|err| CacheError::Rebuild {
            cache_id: self.cache_id.clone(),
            tenant: tenant.to_string(),
            source: err.into(),
        })?;
        let value = Arc::new(value);
        self.live.write().insert(tenant.to_string(), Arc::clone(&value));
        debug!(
            cache_id = %self.cache_id,
            tenant,
            elapsed_ms = millis(started.elapsed()),
            "value rebuilt synchronously"
        );
        Ok(value)
    }

    /// Stop scheduling rebuilds
    ///
    /// A rebuild already running completes. Queued refreshes are dropped
    /// and their waiters return [`CacheError::RefreshStopped`].
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _run_state = self.run_state.write();
        let released = self.release_waiting();
        info!(cache_id = %self.cache_id, released, "refreshable cache shut down");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    // ---------------------------------------------------------------------
    // Queue and worker
    // ---------------------------------------------------------------------

    /// Find or create the tenant's refresh for a caller that found no live
    /// value
    ///
    /// `None` when a value was published since the caller looked. A finished
    /// refresh leaves the queue only after its value is live, so checking
    /// under the queue lock cannot miss one.
    fn enqueue_missing(&self, tenant: &str) -> Option<Arc<Refresh>> {
        let mut queue = self.queue.write();
        if let Some(existing) = queue.iter().find(|refresh| refresh.tenant() == tenant) {
            return Some(Arc::clone(existing));
        }
        if self.live.read().contains_key(tenant) {
            return None;
        }
        Some(self.push_refresh(&mut queue, tenant))
    }

    /// Queue a rebuild of the tenant
    ///
    /// A refresh that is already running is asked to build again once it
    /// finishes, since its build may predate the request.
    fn enqueue_rebuild(&self, tenant: &str) {
        let mut queue = self.queue.write();
        if let Some(existing) = queue.iter().find(|refresh| refresh.tenant() == tenant) {
            existing.request_rerun();
            trace!(cache_id = %self.cache_id, tenant, state = %existing.state(), "refresh already queued");
            return;
        }
        self.push_refresh(&mut queue, tenant);
    }

    fn push_refresh(&self, queue: &mut VecDeque<Arc<Refresh>>, tenant: &str) -> Arc<Refresh> {
        let refresh = Arc::new(Refresh::new(tenant));
        queue.push_back(Arc::clone(&refresh));
        debug!(cache_id = %self.cache_id, tenant, queued = queue.len(), "refresh queued");
        refresh
    }

    /// Schedule a worker unless one is already scheduled or running
    fn submit(&self) -> CacheResult<()> {
        if self.is_stopped() {
            return Err(CacheError::RefreshStopped(self.cache_id.clone()));
        }
        {
            let mut run_state = self.run_state.write();
            if *run_state != RunState::Idle {
                return Ok(());
            }
            *run_state = RunState::Waiting;
        }
        self.dispatch()
    }

    /// Hand a worker to the executor; the run state must be `Waiting`
    ///
    /// If the executor refuses the job, waiting refreshes are released so
    /// their callers wake up and schedule a worker themselves.
    fn dispatch(&self) -> CacheResult<()> {
        let Some(this) = self.weak_self.upgrade() else {
            *self.run_state.write() = RunState::Idle;
            return Ok(());
        };
        if let Err(err) = self.executor.execute(Box::new(move || this.run_once())) {
            let released = {
                let mut run_state = self.run_state.write();
                *run_state = RunState::Idle;
                self.release_waiting()
            };
            error!(
                cache_id = %self.cache_id,
                error_kind = err.kind(),
                error = %err,
                released,
                "failed to schedule refresh worker"
            );
            return Err(err.into());
        }
        Ok(())
    }

    /// Worker body: rebuild the first waiting tenant, then reschedule
    fn run_once(&self) {
        *self.run_state.write() = RunState::Running;
        let next = self.queue.read().iter().find(|refresh| refresh.start()).cloned();
        if let Some(refresh) = next {
            self.rebuild(&refresh);
        }
        self.reschedule();
    }

    fn rebuild(&self, refresh: &Arc<Refresh>) {
        let tenant = refresh.tenant();
        let started = Instant::now();
        match self.builder.build_cache(tenant) {
            Ok(value) => {
                self.live.write().insert(tenant.to_string(), Arc::new(value));
                self.registry
                    .broadcast_event(None, &RefreshableCacheEvent::refreshed(&self.cache_id, tenant));
                let finished = {
                    let mut queue = self.queue.write();
                    let finished = refresh.complete();
                    if finished {
                        queue.retain(|queued| !Arc::ptr_eq(queued, refresh));
                    }
                    finished
                };
                debug!(
                    cache_id = %self.cache_id,
                    tenant,
                    rerun = !finished,
                    elapsed_ms = millis(started.elapsed()),
                    "value rebuilt"
                );
            }
            Err(err) => {
                error!(
                    cache_id = %self.cache_id,
                    tenant,
                    error = ?err,
                    retry_in_ms = millis(self.retry_delay),
                    "rebuild failed"
                );
                refresh.retry();
                if !self.retry_delay.is_zero() {
                    thread::sleep(self.retry_delay);
                }
            }
        }
    }

    fn reschedule(&self) {
        let resubmit = {
            let mut run_state = self.run_state.write();
            if self.is_stopped() {
                self.release_waiting();
                *run_state = RunState::Idle;
                false
            } else {
                let waiting = self
                    .queue
                    .read()
                    .iter()
                    .any(|refresh| refresh.state() == RefreshState::Waiting);
                *run_state = if waiting { RunState::Waiting } else { RunState::Idle };
                waiting
            }
        };
        if resubmit {
            if let Err(err) = self.dispatch() {
                debug!(cache_id = %self.cache_id, error = %err, "worker not rescheduled");
            }
        }
    }

    /// Drop waiting refreshes and wake their callers; caller holds the run
    /// state lock
    fn release_waiting(&self) -> usize {
        let mut queue = self.queue.write();
        let before = queue.len();
        queue.retain(|refresh| !refresh.release_if_waiting());
        before - queue.len()
    }

    // ---------------------------------------------------------------------
    // Transaction deferral
    // ---------------------------------------------------------------------

    fn defer(&self, txn: &Transaction, update: impl FnOnce(&mut PendingRefreshes)) {
        let mut created = false;
        {
            let mut pending = self.pending.entry(txn.id()).or_insert_with(|| {
                created = true;
                PendingRefreshes::default()
            });
            update(pending.value_mut());
        }
        if created {
            if let Some(this) = self.weak_self.upgrade() {
                txn.bind_listener(this);
            }
        }
    }

    fn broadcast_refresh(&self, tenant: &str) {
        self.registry
            .broadcast_event(None, &RefreshableCacheEvent::refresh_requested(&self.cache_id, tenant));
    }

    fn queue_and_submit(&self, tenant: &str) {
        self.enqueue_rebuild(tenant);
        if let Err(err) = self.submit() {
            warn!(cache_id = %self.cache_id, tenant, error = %err, "refresh not scheduled");
        }
    }
}

impl<T> RefreshableCacheListener for AsyncRefreshCache<T>
where
    T: Send + Sync + 'static,
{
    fn cache_id(&self) -> &str {
        &self.cache_id
    }

    fn on_refreshable_cache_event(&self, txn: Option<&Transaction>, event: &RefreshableCacheEvent) {
        if event.cache_id != self.cache_id || event.kind != RefreshEventKind::RefreshRequested {
            return;
        }
        match txn.filter(|txn| txn.is_active()) {
            Some(txn) => {
                self.defer(txn, |pending| {
                    pending.queue.insert(event.tenant_id.clone());
                });
            }
            None => self.queue_and_submit(&event.tenant_id),
        }
    }
}

impl<T> TransactionListener for AsyncRefreshCache<T>
where
    T: Send + Sync + 'static,
{
    fn after_commit(&self, txn: &Transaction) -> CacheResult<()> {
        let Some((_, pending)) = self.pending.remove(&txn.id()) else {
            return Ok(());
        };
        for tenant in &pending.queue {
            self.queue_and_submit(tenant);
        }
        for tenant in &pending.broadcast {
            self.broadcast_refresh(tenant);
        }
        Ok(())
    }

    fn after_rollback(&self, txn: &Transaction) {
        if let Some((_, pending)) = self.pending.remove(&txn.id()) {
            debug!(
                cache_id = %self.cache_id,
                txn = %txn.id(),
                dropped = pending.broadcast.len() + pending.queue.len(),
                "deferred refreshes dropped on rollback"
            );
        }
    }
}

impl<T> fmt::Debug for AsyncRefreshCache<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRefreshCache")
            .field("cache_id", &self.cache_id)
            .field("run_state", &self.run_state())
            .field("queued", &self.queued_tenants())
            .field("live", &self.live_tenants())
            .finish_non_exhaustive()
    }
}
