//! # Repocache Core
//!
//! Transactional two-level caching for a multi-tenant content repository.
//!
//! This crate contains:
//! - [`TransactionalCache`]: per-transaction isolated views merged into a
//!   shared cache at commit under optimistic-concurrency rules
//! - [`AsyncRefreshCache`]: per-tenant values rebuilt in the background with
//!   coalesced requests and automatic retry
//! - [`CacheManager`]: the explicitly owned registry of caches
//!
//! ## Architecture Principles
//! - Only depends on `repocache-common` for shared infrastructure
//! - Collaborators (shared cache, transactions, tenants) are traits
//! - Cache misses, conflicts and overflow never surface as errors

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod config;
pub mod error;
pub mod manager;
pub mod refresh;
pub mod tenant;
pub mod transaction;
pub mod txn_cache;

pub use config::{CacheManagerConfig, RefreshSettings, TransactionalCacheConfig};
pub use error::{CacheError, CacheResult};
pub use manager::CacheManager;
pub use refresh::{
    AsyncRefreshCache, CacheBuilder, LocalRefreshRegistry, RefreshEventKind,
    RefreshableCacheEvent, RefreshableCacheListener, RefreshableCacheRegistry,
};
pub use tenant::{FixedTenantResolver, TenantResolver, ThreadTenantResolver, DEFAULT_TENANT};
pub use transaction::{Transaction, TransactionListener, TransactionManager, TxnReadState};
pub use txn_cache::{CacheBucket, CacheKey, RegionKey, TransactionalCache, ValueWrapper};
