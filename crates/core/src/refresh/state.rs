//! Rebuild bookkeeping for [`AsyncRefreshCache`](super::AsyncRefreshCache)

use std::fmt;
use std::hash::{Hash, Hasher};

use parking_lot::{Condvar, Mutex};
use repocache_common::impl_state_names;
use serde::{Deserialize, Serialize};

/// Lifecycle of one queued rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    Idle,
    /// Queued and waiting for a worker
    Waiting,
    Running,
    /// The rebuilt value is live
    Done,
}

impl_state_names!(RefreshState {
    Idle => "idle",
    Waiting => "waiting",
    Running => "running",
    Done => "done",
});

/// Whether a worker is scheduled or executing for a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Waiting,
    Running,
}

impl_state_names!(RunState {
    Idle => "idle",
    Waiting => "waiting",
    Running => "running",
});

#[derive(Debug)]
struct Progress {
    state: RefreshState,
    rerun_requested: bool,
}

/// A request to rebuild the value of one tenant
///
/// Two refreshes are the same refresh when they name the same tenant, so a
/// queue holds at most one entry per tenant. Threads that need the rebuilt
/// value block in [`wait_done`](Self::wait_done).
pub struct Refresh {
    tenant: String,
    progress: Mutex<Progress>,
    done: Condvar,
}

impl Refresh {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            progress: Mutex::new(Progress { state: RefreshState::Waiting, rerun_requested: false }),
            done: Condvar::new(),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn state(&self) -> RefreshState {
        self.progress.lock().state
    }

    /// Move a waiting refresh to `Running`; false if it was not waiting
    pub(crate) fn start(&self) -> bool {
        let mut progress = self.progress.lock();
        if progress.state != RefreshState::Waiting {
            return false;
        }
        progress.state = RefreshState::Running;
        progress.rerun_requested = false;
        true
    }

    /// Ask for another build after the running one, since its inputs may
    /// already be stale
    pub(crate) fn request_rerun(&self) {
        let mut progress = self.progress.lock();
        if progress.state == RefreshState::Running {
            progress.rerun_requested = true;
        }
    }

    /// Record a successful build
    ///
    /// Returns true when the refresh is finished; false when a rerun was
    /// requested and the refresh is waiting again.
    pub(crate) fn complete(&self) -> bool {
        let mut progress = self.progress.lock();
        if progress.rerun_requested {
            progress.rerun_requested = false;
            progress.state = RefreshState::Waiting;
            return false;
        }
        progress.state = RefreshState::Done;
        drop(progress);
        self.done.notify_all();
        true
    }

    /// Put a failed build back in line
    pub(crate) fn retry(&self) {
        let mut progress = self.progress.lock();
        progress.state = RefreshState::Waiting;
        progress.rerun_requested = false;
    }

    /// Give up on a refresh that never started, waking its waiters
    ///
    /// Returns false if the refresh was not waiting.
    pub(crate) fn release_if_waiting(&self) -> bool {
        let mut progress = self.progress.lock();
        if progress.state != RefreshState::Waiting {
            return false;
        }
        progress.state = RefreshState::Done;
        drop(progress);
        self.done.notify_all();
        true
    }

    /// Block until the refresh is `Done`
    pub fn wait_done(&self) {
        let mut progress = self.progress.lock();
        while progress.state != RefreshState::Done {
            self.done.wait(&mut progress);
        }
    }
}

impl PartialEq for Refresh {
    fn eq(&self, other: &Self) -> bool {
        self.tenant == other.tenant
    }
}

impl Eq for Refresh {}

impl Hash for Refresh {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tenant.hash(state);
    }
}

impl fmt::Debug for Refresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = self.progress.lock();
        f.debug_struct("Refresh")
            .field("tenant", &self.tenant)
            .field("state", &progress.state)
            .field("rerun_requested", &progress.rerun_requested)
            .finish()
    }
}
