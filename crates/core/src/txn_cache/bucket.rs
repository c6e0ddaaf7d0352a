//! Transaction-local entries and their commit-time reconciliation

use super::wrapper::ValueWrapper;

/// How a transaction-local entry is reconciled against the shared cache
#[derive(Debug, Clone)]
pub enum CacheBucket<V> {
    /// No shared entry was known when the value was staged
    New { value: V },
    /// A shared entry was observed; `original` is what the transaction saw
    Update { original: ValueWrapper<V>, value: V },
    /// Memoized read-through; never written back
    Read { observed: ValueWrapper<V> },
}

/// Commit-time behaviour switches taken from the cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    pub mutable: bool,
    pub allow_equals_checks: bool,
}

/// Outcome of reconciling one bucket at post-commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCommitAction {
    /// Write the local value under a fresh wrapper
    Write,
    /// Invalidate the shared entry
    Remove,
    /// Leave the shared cache untouched
    Keep,
}

impl<V> CacheBucket<V> {
    /// The value the transaction sees for this key
    pub const fn value(&self) -> &V {
        match self {
            Self::New { value } | Self::Update { value, .. } => value,
            Self::Read { observed } => observed.value(),
        }
    }

    pub fn into_value(self) -> V {
        match self {
            Self::New { value } | Self::Update { value, .. } => value,
            Self::Read { observed } => observed.into_value(),
        }
    }

    /// Whether post-commit may write this bucket to the shared cache
    pub const fn is_flushable(&self) -> bool {
        !matches!(self, Self::Read { .. })
    }

    /// Wrapper observed in the shared cache when the bucket was created
    pub const fn observed(&self) -> Option<&ValueWrapper<V>> {
        match self {
            Self::New { .. } => None,
            Self::Update { original, .. } => Some(original),
            Self::Read { observed } => Some(observed),
        }
    }

    /// Pre-commit hook; the shared cache is only written after commit
    pub const fn pre_commit(&self) {}

    /// Decide what post-commit does with this bucket given the shared entry
    /// present now
    pub fn resolve(&self, shared: Option<&ValueWrapper<V>>, policy: CommitPolicy) -> PostCommitAction
    where
        V: PartialEq,
    {
        match self {
            Self::Read { .. } => PostCommitAction::Keep,
            Self::New { value } => match shared {
                None => PostCommitAction::Write,
                Some(current) => resolve_foreign(current, value, policy),
            },
            Self::Update { original, value } => match shared {
                None if policy.mutable => PostCommitAction::Keep,
                None => PostCommitAction::Write,
                Some(current) if current == original => PostCommitAction::Write,
                Some(current) => resolve_foreign(current, value, policy),
            },
        }
    }
}

/// A shared entry exists that this transaction did not observe
fn resolve_foreign<V: PartialEq>(
    current: &ValueWrapper<V>,
    value: &V,
    policy: CommitPolicy,
) -> PostCommitAction {
    if !policy.mutable {
        PostCommitAction::Keep
    } else if policy.allow_equals_checks && current.value() == value {
        PostCommitAction::Keep
    } else {
        PostCommitAction::Remove
    }
}
