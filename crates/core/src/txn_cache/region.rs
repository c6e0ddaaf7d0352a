use std::fmt;

/// A key scoped to one tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionKey<K> {
    tenant: String,
    key: K,
}

impl<K> RegionKey<K> {
    pub fn new(tenant: impl Into<String>, key: K) -> Self {
        Self { tenant: tenant.into(), key }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub const fn key(&self) -> &K {
        &self.key
    }
}

/// Key as stored in the shared cache
///
/// Keys of the default tenant (or of caches that are not tenant aware) are
/// stored as-is; all other keys carry their tenant, so entries of different
/// tenants never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey<K> {
    Plain(K),
    Region(RegionKey<K>),
}

impl<K> CacheKey<K> {
    /// The caller-visible key
    pub const fn inner(&self) -> &K {
        match self {
            Self::Plain(key) => key,
            Self::Region(region) => &region.key,
        }
    }

    pub fn into_inner(self) -> K {
        match self {
            Self::Plain(key) => key,
            Self::Region(region) => region.key,
        }
    }

    /// Tenant the key belongs to; `None` for plain keys
    pub fn tenant(&self) -> Option<&str> {
        match self {
            Self::Plain(_) => None,
            Self::Region(region) => Some(&region.tenant),
        }
    }
}

impl<K: fmt::Debug> fmt::Display for CacheKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(key) => write!(f, "{key:?}"),
            Self::Region(region) => write!(f, "{}:{:?}", region.tenant, region.key),
        }
    }
}
