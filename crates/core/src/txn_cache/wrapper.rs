use std::fmt;

/// A shared-cache value tagged with a random write identity
///
/// Every write into the shared cache creates a new wrapper. Two wrappers are
/// equal only when they share the same nonce, so a transaction can tell "the
/// entry I observed" from "an entry someone wrote since", even when both
/// carry equal payloads.
#[derive(Clone)]
pub struct ValueWrapper<V> {
    value: V,
    nonce: u64,
}

impl<V> ValueWrapper<V> {
    /// Wrap a value with a fresh 63-bit nonce
    pub fn new(value: V) -> Self {
        Self { value, nonce: rand::random::<u64>() >> 1 }
    }

    pub const fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub const fn nonce(&self) -> u64 {
        self.nonce
    }
}

impl<V> PartialEq for ValueWrapper<V> {
    fn eq(&self, other: &Self) -> bool {
        self.nonce == other.nonce
    }
}

impl<V> Eq for ValueWrapper<V> {}

impl<V: fmt::Debug> fmt::Debug for ValueWrapper<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{:x}", self.value, self.nonce)
    }
}
