//! Minimal transaction collaborator
//!
//! Caches need three things from a transaction: a stable identity to key
//! their transaction-local state by, the read-only flag, and lifecycle
//! callbacks around commit and rollback. A [`Transaction`] is an explicit
//! context object passed to every cache call that should participate.

mod context;
mod manager;

use std::fmt;

use repocache_common::impl_state_names;

pub use context::Transaction;
pub use manager::TransactionManager;

use crate::error::CacheResult;

/// Identity of one transaction, unique within the process
///
/// Combines the issuing [`TransactionManager`]'s process-wide number with
/// that manager's sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId {
    manager: u64,
    sequence: u64,
}

impl TxnId {
    pub(crate) const fn new(manager: u64, sequence: u64) -> Self {
        Self { manager, sequence }
    }

    /// Number of the manager that issued this id
    pub const fn manager(self) -> u64 {
        self.manager
    }

    /// Position of this transaction among its manager's transactions
    pub const fn sequence(self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}.{}", self.manager, self.sequence)
    }
}

/// Whether a transaction may write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxnReadState {
    ReadOnly,
    #[default]
    ReadWrite,
}

/// Lifecycle status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    /// Accepting work
    Active,
    /// Commit callbacks are running
    Preparing,
    Committed,
    RolledBack,
}

impl_state_names!(TxnStatus {
    Active => "active",
    Preparing => "preparing",
    Committed => "committed",
    RolledBack => "rolled_back",
});

impl TxnStatus {
    /// Whether transaction-local state may still be used
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Preparing)
    }
}

/// Callbacks invoked around transaction completion
///
/// All methods default to no-ops. `before_commit` runs while the outcome is
/// still undecided and may veto the commit by returning an error;
/// `after_commit` runs once the commit is durable and its errors are
/// reported to the committer.
pub trait TransactionListener: Send + Sync {
    fn before_commit(&self, _txn: &Transaction, _read_only: bool) -> CacheResult<()> {
        Ok(())
    }

    fn before_completion(&self, _txn: &Transaction) {}

    fn after_commit(&self, _txn: &Transaction) -> CacheResult<()> {
        Ok(())
    }

    fn after_rollback(&self, _txn: &Transaction) {}
}
