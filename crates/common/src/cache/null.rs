//! A shared cache that stores nothing

use std::marker::PhantomData;

use super::traits::SharedCache;
use crate::error::CommonResult;

/// No-op [`SharedCache`]: every read misses and every write is dropped
///
/// Used when a transactional cache is configured with its shared level
/// disabled, so that every transaction computes fresh values.
#[derive(Debug)]
pub struct NullCache<K, V> {
    name: String,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K, V> NullCache<K, V> {
    /// Create a no-op cache with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), _marker: PhantomData }
    }
}

impl<K, V> SharedCache<K, V> for NullCache<K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, _key: &K) -> CommonResult<Option<V>> {
        Ok(None)
    }

    fn put(&self, _key: K, _value: V) -> CommonResult<()> {
        Ok(())
    }

    fn remove(&self, _key: &K) -> CommonResult<()> {
        Ok(())
    }

    fn clear(&self) -> CommonResult<()> {
        Ok(())
    }

    fn keys(&self) -> CommonResult<Vec<K>> {
        Ok(Vec::new())
    }
}
