//! Shared cache contract and in-process implementations
//!
//! The transactional cache layer in `repocache-core` sits on top of any
//! [`SharedCache`]. This module provides the trait plus two implementations:
//!
//! - [`MemoryCache`]: thread-safe map with optional size bound and LRU/FIFO
//!   eviction, with optional hit/miss statistics
//! - [`NullCache`]: stores nothing, used to disable the shared level
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use repocache_common::cache::{CacheConfig, MemoryCache, SharedCache};
//!
//! let cache = Arc::new(MemoryCache::new(CacheConfig::lru("userCache", 100)));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|i| {
//!         let cache = Arc::clone(&cache);
//!         thread::spawn(move || cache.put(format!("user-{i}"), i).unwrap())
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(cache.len(), 4);
//! ```

mod config;
mod core;
mod null;
mod stats;
mod traits;

pub use config::{CacheConfig, CacheConfigBuilder, EvictionPolicy};
pub use null::NullCache;
pub use stats::CacheStats;
pub use traits::SharedCache;

pub use self::core::MemoryCache;
