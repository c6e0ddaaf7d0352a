//! Specialized data structures
//!
//! - **[`lru`]**: insertion-ordered bounded map with oldest-first eviction,
//!   used for transaction-local update buffers.

pub mod lru;

pub use lru::LruCache;
