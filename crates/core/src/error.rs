//! Error types for the transactional and refresh caches
//!
//! Most cache conditions never surface as errors: capacity overflow and
//! optimistic conflicts degrade to invalidation, and asynchronous rebuild
//! failures are retried. What remains is listed here.

use repocache_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use repocache_common::{impl_error_classification, impl_error_conversion};
use thiserror::Error;

use crate::transaction::{TxnId, TxnStatus};

/// Boxed error source for failures coming from user-supplied hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the cache layer
#[derive(Debug, Error)]
pub enum CacheError {
    /// Writing a committed bucket into the shared cache failed
    ///
    /// The shared cache is in an unknown state for this key, so the failure
    /// is surfaced as a transaction failure.
    #[error(
        "failed to flush committed value to shared cache '{cache}': key={key}, \
         new_value={new_value}, shared_value={shared_value}"
    )]
    PostCommitFlush {
        cache: String,
        key: String,
        new_value: String,
        shared_value: String,
        #[source]
        source: CommonError,
    },

    /// Commit or rollback requested on a finished transaction
    #[error("transaction {txn} cannot {operation}: status is {status}")]
    TransactionState { txn: TxnId, operation: &'static str, status: TxnStatus },

    /// Synchronous rebuild of a refreshable cache failed
    #[error("rebuild of cache '{cache_id}' for tenant '{tenant}' failed")]
    Rebuild {
        cache_id: String,
        tenant: String,
        #[source]
        source: BoxError,
    },

    /// The refreshable cache was shut down before the value was available
    #[error("refreshable cache '{0}' is shut down")]
    RefreshStopped(String),

    /// No cache is registered under this name
    #[error("unknown cache '{0}'")]
    UnknownCache(String),

    /// A cache exists under this name but with different key/value types
    #[error("cache '{0}' is registered with different key or value types")]
    CacheTypeMismatch(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Result alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

impl_error_conversion!(CacheError, Common);

impl_error_classification!(CacheError, Common,
    Self::PostCommitFlush { .. } => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    },
    Self::TransactionState { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::Rebuild { .. } => {
        retryable: true,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::RefreshStopped(_) => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::UnknownCache(_) => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::CacheTypeMismatch(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
);
