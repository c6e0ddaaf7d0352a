//! The shared cache contract
//!
//! The transactional layer only needs a minimal map contract from whatever
//! holds the process-wide (or cluster-wide) entries. Every method returns a
//! `CommonResult` so that a backend can report structural failures such as a
//! value it cannot serialize; ordinary misses are `Ok(None)`.

use crate::error::CommonResult;

/// Thread-safe key/value store shared by all transactions
pub trait SharedCache<K, V>: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Look up a key
    fn get(&self, key: &K) -> CommonResult<Option<V>>;

    /// Insert or replace a value
    fn put(&self, key: K, value: V) -> CommonResult<()>;

    /// Remove a key; removing an absent key is not an error
    fn remove(&self, key: &K) -> CommonResult<()>;

    /// Remove every entry
    fn clear(&self) -> CommonResult<()>;

    /// Snapshot of the keys currently present
    fn keys(&self) -> CommonResult<Vec<K>>;

    /// Check whether a key is present
    fn contains(&self, key: &K) -> CommonResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
