use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::{Transaction, TxnId, TxnReadState};
use crate::error::CacheError;

static NEXT_MANAGER: AtomicU64 = AtomicU64::new(1);

/// Issues transactions whose ids are unique across every manager in the
/// process
#[derive(Debug)]
pub struct TransactionManager {
    manager: u64,
    next_sequence: AtomicU64,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            manager: NEXT_MANAGER.fetch_add(1, Ordering::Relaxed),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Start a new transaction
    pub fn begin(&self, read_state: TxnReadState) -> Transaction {
        let id = TxnId::new(self.manager, self.next_sequence.fetch_add(1, Ordering::Relaxed));
        trace!(txn = %id, ?read_state, "transaction started");
        Transaction::new(id, read_state)
    }

    /// Run `work` in a new transaction, committing on `Ok` and rolling back
    /// on `Err`
    ///
    /// A commit failure is returned in place of the work's result.
    pub fn do_in_transaction<T, E, F>(&self, read_state: TxnReadState, work: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction) -> Result<T, E>,
        E: From<CacheError>,
    {
        let txn = self.begin(read_state);
        match work(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.rollback()?;
                Err(err)
            }
        }
    }
}
