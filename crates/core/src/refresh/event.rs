//! Refresh notifications between caches
//!
//! Any party can ask a refreshable cache to rebuild a tenant's value by
//! broadcasting a [`RefreshableCacheEvent`] through a
//! [`RefreshableCacheRegistry`]. Each registered cache filters events by its
//! own id.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use repocache_common::impl_state_names;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshEventKind {
    /// The value of `tenant_id` is stale and should be rebuilt
    RefreshRequested,
    /// A rebuilt value was published
    Refreshed,
}

impl_state_names!(RefreshEventKind {
    RefreshRequested => "refresh_requested",
    Refreshed => "refreshed",
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefreshableCacheEvent {
    pub cache_id: String,
    pub tenant_id: String,
    pub kind: RefreshEventKind,
}

impl RefreshableCacheEvent {
    pub fn refresh_requested(cache_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            cache_id: cache_id.into(),
            tenant_id: tenant_id.into(),
            kind: RefreshEventKind::RefreshRequested,
        }
    }

    pub fn refreshed(cache_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            cache_id: cache_id.into(),
            tenant_id: tenant_id.into(),
            kind: RefreshEventKind::Refreshed,
        }
    }
}

impl fmt::Display for RefreshableCacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]:{}", self.cache_id, self.tenant_id, self.kind)
    }
}

/// Receiver of refresh events
pub trait RefreshableCacheListener: Send + Sync {
    /// Id events must carry to concern this listener
    fn cache_id(&self) -> &str;

    /// Handle an event; `txn` is the transaction the event was raised in,
    /// if any
    fn on_refreshable_cache_event(&self, txn: Option<&Transaction>, event: &RefreshableCacheEvent);
}

/// Fan-out point for refresh events
pub trait RefreshableCacheRegistry: Send + Sync {
    fn register(&self, listener: Weak<dyn RefreshableCacheListener>);

    fn broadcast_event(&self, txn: Option<&Transaction>, event: &RefreshableCacheEvent);
}

/// In-process registry holding weak references to its listeners
///
/// Listeners that have been dropped are pruned on the next broadcast.
#[derive(Default)]
pub struct LocalRefreshRegistry {
    listeners: RwLock<Vec<Weak<dyn RefreshableCacheListener>>>,
}

impl LocalRefreshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live listeners
    pub fn len(&self) -> usize {
        self.listeners.read().iter().filter(|listener| listener.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RefreshableCacheRegistry for LocalRefreshRegistry {
    fn register(&self, listener: Weak<dyn RefreshableCacheListener>) {
        self.listeners.write().push(listener);
    }

    fn broadcast_event(&self, txn: Option<&Transaction>, event: &RefreshableCacheEvent) {
        // Snapshot first so listeners may broadcast or register re-entrantly.
        let live: Vec<Arc<dyn RefreshableCacheListener>> = {
            let mut listeners = self.listeners.write();
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        trace!(event = %event, listeners = live.len(), "broadcasting refresh event");
        for listener in live {
            listener.on_refreshable_cache_event(txn, event);
        }
    }
}

impl fmt::Debug for LocalRefreshRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalRefreshRegistry").field("listeners", &self.len()).finish()
    }
}
