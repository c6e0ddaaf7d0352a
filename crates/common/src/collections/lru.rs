//! Insertion-ordered bounded map
//!
//! Wraps the `lru` crate. Unlike a classic LRU, lookups never promote an
//! entry and replacing the value of an existing key keeps its position, so
//! the order is pure insertion order and the oldest entry is evicted first.

use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache as ExternalLruCache;

/// Bounded map that evicts its oldest insertion when full
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use repocache_common::collections::LruCache;
///
/// let mut map = LruCache::new(NonZeroUsize::MIN.saturating_add(1));
/// assert_eq!(map.insert("a", 1), None);
/// assert_eq!(map.insert("b", 2), None);
/// assert_eq!(map.insert("a", 10), None); // replaced in place
///
/// assert_eq!(map.insert("c", 3), Some(("a", 10))); // oldest evicted
/// ```
#[derive(Debug)]
pub struct LruCache<K, V>
where
    K: Hash + Eq,
{
    inner: ExternalLruCache<K, V>,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// Create a new map with the specified non-zero capacity
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self { inner: ExternalLruCache::new(capacity) }
    }

    /// Create a new map, clamping a zero capacity to one
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    /// Insert or replace a value
    ///
    /// Replacing keeps the key's original position. Returns the evicted
    /// oldest entry when a new key did not fit.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(slot) = self.inner.peek_mut(&key) {
            *slot = value;
            return None;
        }
        self.inner.push(key, value)
    }

    /// Get a value without changing its position
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.peek(key)
    }

    /// Get a mutable value without changing its position
    pub fn peek_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.peek_mut(key)
    }

    /// Check if a key exists
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains(key)
    }

    /// Remove a key
    pub fn pop<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.pop(key)
    }

    /// Remove and return the oldest entry
    pub fn pop_oldest(&mut self) -> Option<(K, V)> {
        self.inner.pop_lru()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Capacity of the map
    pub fn cap(&self) -> usize {
        self.inner.cap().get()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Iterate from the oldest insertion to the newest
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter().rev()
    }

    /// Consume the map, yielding entries oldest first
    pub fn into_oldest_first(mut self) -> impl Iterator<Item = (K, V)> {
        std::iter::from_fn(move || self.inner.pop_lru())
    }
}
