use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::{TransactionListener, TxnId, TxnReadState, TxnStatus};
use crate::error::{CacheError, CacheResult};

/// An explicit transaction context
///
/// Obtained from [`TransactionManager::begin`](super::TransactionManager::begin)
/// and passed by reference to cache operations. Listeners bound to the
/// transaction are called in binding order on commit or rollback. Dropping
/// a transaction that was never completed rolls it back.
pub struct Transaction {
    id: TxnId,
    read_state: TxnReadState,
    status: Mutex<TxnStatus>,
    listeners: Mutex<Vec<Arc<dyn TransactionListener>>>,
}

impl Transaction {
    pub(crate) fn new(id: TxnId, read_state: TxnReadState) -> Self {
        Self {
            id,
            read_state,
            status: Mutex::new(TxnStatus::Active),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub const fn id(&self) -> TxnId {
        self.id
    }

    pub const fn read_state(&self) -> TxnReadState {
        self.read_state
    }

    pub fn is_read_only(&self) -> bool {
        self.read_state == TxnReadState::ReadOnly
    }

    pub fn status(&self) -> TxnStatus {
        *self.status.lock()
    }

    /// True while caches may still keep state for this transaction
    pub fn is_active(&self) -> bool {
        self.status().is_open()
    }

    /// Register a completion listener; binding the same listener twice is a
    /// no-op
    pub fn bind_listener(&self, listener: Arc<dyn TransactionListener>) {
        let mut listeners = self.listeners.lock();
        let incoming = Arc::as_ptr(&listener).cast::<()>();
        if listeners.iter().any(|bound| Arc::as_ptr(bound).cast::<()>() == incoming) {
            return;
        }
        listeners.push(listener);
    }

    /// Number of bound listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Commit the transaction
    ///
    /// Runs `before_commit` on every listener, including listeners bound by
    /// other listeners during this phase. A `before_commit` error rolls the
    /// transaction back and is returned. Every `after_commit` runs even if an
    /// earlier one fails; the first failure is returned.
    pub fn commit(&self) -> CacheResult<()> {
        self.transition(TxnStatus::Active, TxnStatus::Preparing, "commit")?;
        let read_only = self.is_read_only();

        let mut index = 0;
        while let Some(listener) = self.listener_at(index) {
            if let Err(err) = listener.before_commit(self, read_only) {
                warn!(txn = %self.id, error = %err, "before_commit failed, rolling back");
                self.finish_rollback();
                return Err(err);
            }
            index += 1;
        }

        let listeners = self.listeners.lock().clone();
        for listener in &listeners {
            listener.before_completion(self);
        }

        *self.status.lock() = TxnStatus::Committed;

        let mut first_error = None;
        for listener in &listeners {
            if let Err(err) = listener.after_commit(self) {
                error!(txn = %self.id, error = %err, "after_commit failed");
                first_error.get_or_insert(err);
            }
        }
        self.listeners.lock().clear();
        debug!(txn = %self.id, listeners = listeners.len(), "transaction committed");

        first_error.map_or(Ok(()), Err)
    }

    /// Roll the transaction back
    pub fn rollback(&self) -> CacheResult<()> {
        let status = self.status();
        if !status.is_open() {
            return Err(CacheError::TransactionState { txn: self.id, operation: "roll back", status });
        }
        self.finish_rollback();
        Ok(())
    }

    fn listener_at(&self, index: usize) -> Option<Arc<dyn TransactionListener>> {
        self.listeners.lock().get(index).cloned()
    }

    fn transition(
        &self,
        from: TxnStatus,
        to: TxnStatus,
        operation: &'static str,
    ) -> CacheResult<()> {
        let mut status = self.status.lock();
        if *status != from {
            return Err(CacheError::TransactionState { txn: self.id, operation, status: *status });
        }
        *status = to;
        Ok(())
    }

    fn finish_rollback(&self) {
        let listeners = std::mem::take(&mut *self.listeners.lock());
        for listener in &listeners {
            listener.before_completion(self);
        }
        *self.status.lock() = TxnStatus::RolledBack;
        for listener in &listeners {
            listener.after_rollback(self);
        }
        debug!(txn = %self.id, listeners = listeners.len(), "transaction rolled back");
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.status().is_open() {
            debug!(txn = %self.id, "transaction dropped while open");
            self.finish_rollback();
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("read_state", &self.read_state)
            .field("status", &self.status())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
