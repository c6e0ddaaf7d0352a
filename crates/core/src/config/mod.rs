//! Cache configuration
//!
//! Caches are configured per name. A [`CacheManagerConfig`] collects the
//! per-cache settings plus the settings of the background refresh pool, and
//! can be loaded from TOML or JSON with [`loader`].

pub mod loader;

use std::collections::HashSet;
use std::time::Duration;

use repocache_common::duration_millis;
use repocache_common::error::{CommonError, CommonResult};
use serde::{Deserialize, Serialize};

pub use loader::{load, load_from_file, probe_config_paths};

const DEFAULT_MAX_CACHE_SIZE: usize = 10_000;
const DEFAULT_WORKER_THREADS: usize = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Settings of one transactional cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionalCacheConfig {
    /// Cache name, unique within a manager
    pub name: String,

    /// Bound on transaction-local updates and removals before the
    /// transaction falls back to clearing the shared cache at commit
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Whether cached values may change over time
    ///
    /// Immutable caches never invalidate a foreign shared entry because any
    /// entry present must already be correct.
    #[serde(default = "default_true")]
    pub mutable: bool,

    /// Compare values at commit to skip writes that would change nothing
    #[serde(default)]
    pub allow_equals_checks: bool,

    /// Route all shared-level operations to a no-op cache
    #[serde(default)]
    pub disable_shared_cache: bool,

    /// Scope keys to the calling tenant
    #[serde(default = "default_true")]
    pub tenant_aware: bool,

    /// Size bound of the in-process shared cache created for this cache
    #[serde(default)]
    pub shared_max_size: Option<usize>,
}

const fn default_max_cache_size() -> usize {
    DEFAULT_MAX_CACHE_SIZE
}

const fn default_true() -> bool {
    true
}

impl TransactionalCacheConfig {
    /// Configuration with defaults for every setting but the name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            mutable: true,
            allow_equals_checks: false,
            disable_shared_cache: false,
            tenant_aware: true,
            shared_max_size: None,
        }
    }

    /// Start a builder for the named cache
    pub fn builder(name: impl Into<String>) -> TransactionalCacheConfigBuilder {
        TransactionalCacheConfigBuilder { config: Self::new(name) }
    }

    /// Check the settings for values the cache cannot work with
    pub fn validate(&self) -> CommonResult<()> {
        if self.name.trim().is_empty() {
            return Err(CommonError::config_field("name", "cache name must not be empty"));
        }
        if self.max_cache_size == 0 {
            return Err(CommonError::config_field(
                "max_cache_size",
                format!("cache '{}': must be greater than zero", self.name),
            ));
        }
        if self.shared_max_size == Some(0) {
            return Err(CommonError::config_field(
                "shared_max_size",
                format!("cache '{}': must be greater than zero when set", self.name),
            ));
        }
        Ok(())
    }
}

/// Builder for [`TransactionalCacheConfig`]
#[derive(Debug, Clone)]
pub struct TransactionalCacheConfigBuilder {
    config: TransactionalCacheConfig,
}

impl TransactionalCacheConfigBuilder {
    pub const fn max_cache_size(mut self, size: usize) -> Self {
        self.config.max_cache_size = size;
        self
    }

    pub const fn mutable(mut self, mutable: bool) -> Self {
        self.config.mutable = mutable;
        self
    }

    pub const fn allow_equals_checks(mut self, enabled: bool) -> Self {
        self.config.allow_equals_checks = enabled;
        self
    }

    pub const fn disable_shared_cache(mut self, disabled: bool) -> Self {
        self.config.disable_shared_cache = disabled;
        self
    }

    pub const fn tenant_aware(mut self, enabled: bool) -> Self {
        self.config.tenant_aware = enabled;
        self
    }

    pub const fn shared_max_size(mut self, size: usize) -> Self {
        self.config.shared_max_size = Some(size);
        self
    }

    pub fn build(self) -> TransactionalCacheConfig {
        self.config
    }
}

/// Settings of the background refresh pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Worker threads shared by all refreshable caches
    pub worker_threads: usize,

    /// Pause before a failed rebuild is retried
    #[serde(with = "duration_millis")]
    pub retry_delay: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self { worker_threads: DEFAULT_WORKER_THREADS, retry_delay: DEFAULT_RETRY_DELAY }
    }
}

/// Top-level configuration consumed by [`CacheManager`](crate::CacheManager)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManagerConfig {
    #[serde(default)]
    pub caches: Vec<TransactionalCacheConfig>,

    #[serde(default)]
    pub refresh: RefreshSettings,
}

impl CacheManagerConfig {
    /// Settings for the named cache, if configured
    pub fn cache(&self, name: &str) -> Option<&TransactionalCacheConfig> {
        self.caches.iter().find(|cache| cache.name == name)
    }

    /// Add or replace the settings of one cache
    #[must_use]
    pub fn with_cache(mut self, cache: TransactionalCacheConfig) -> Self {
        self.caches.retain(|existing| existing.name != cache.name);
        self.caches.push(cache);
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(contents: &str) -> CommonResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every cache plus the refresh settings
    pub fn validate(&self) -> CommonResult<()> {
        let mut names = HashSet::new();
        for cache in &self.caches {
            cache.validate()?;
            if !names.insert(cache.name.as_str()) {
                return Err(CommonError::config_field(
                    "caches",
                    format!("duplicate cache name '{}'", cache.name),
                ));
            }
        }
        if self.refresh.worker_threads == 0 {
            return Err(CommonError::config_field(
                "refresh.worker_threads",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache configuration.
    use super::*;

    /// Validates defaults applied to a name-only TOML entry.
    ///
    /// Assertions:
    /// - Confirms every omitted field takes its default.
    #[test]
    fn test_toml_defaults() {
        let config = CacheManagerConfig::from_toml_str(
            r#"
            [[caches]]
            name = "nodeCache"
            "#,
        )
        .unwrap();

        let node = config.cache("nodeCache").unwrap();
        assert_eq!(node, &TransactionalCacheConfig::new("nodeCache"));
        assert_eq!(config.refresh, RefreshSettings::default());
    }

    /// Validates that explicit values override the defaults.
    #[test]
    fn test_toml_overrides() {
        let config = CacheManagerConfig::from_toml_str(
            r#"
            [refresh]
            worker_threads = 4
            retry_delay = 250

            [[caches]]
            name = "aclCache"
            max_cache_size = 50
            mutable = false
            allow_equals_checks = true
            tenant_aware = false
            shared_max_size = 1000
            "#,
        )
        .unwrap();

        let acl = config.cache("aclCache").unwrap();
        assert_eq!(acl.max_cache_size, 50);
        assert!(!acl.mutable);
        assert!(acl.allow_equals_checks);
        assert!(!acl.tenant_aware);
        assert_eq!(acl.shared_max_size, Some(1000));
        assert_eq!(config.refresh.worker_threads, 4);
        assert_eq!(config.refresh.retry_delay, Duration::from_millis(250));
    }

    /// Validates rejection of invalid settings.
    ///
    /// Assertions:
    /// - Ensures a zero `max_cache_size` is rejected.
    /// - Ensures duplicate names are rejected.
    /// - Ensures zero worker threads are rejected.
    #[test]
    fn test_validation_failures() {
        let zero = TransactionalCacheConfig::builder("c").max_cache_size(0).build();
        assert!(zero.validate().is_err());

        let duplicate = CacheManagerConfig {
            caches: vec![TransactionalCacheConfig::new("c"), TransactionalCacheConfig::new("c")],
            refresh: RefreshSettings::default(),
        };
        assert!(duplicate.validate().is_err());

        let no_workers = CacheManagerConfig {
            caches: Vec::new(),
            refresh: RefreshSettings { worker_threads: 0, ..RefreshSettings::default() },
        };
        assert!(no_workers.validate().is_err());
    }

    /// Validates the builder and `with_cache` replacement.
    #[test]
    fn test_builder_and_with_cache() {
        let config = CacheManagerConfig::default()
            .with_cache(TransactionalCacheConfig::new("a"))
            .with_cache(
                TransactionalCacheConfig::builder("a")
                    .max_cache_size(5)
                    .disable_shared_cache(true)
                    .shared_max_size(10)
                    .build(),
            );
        assert_eq!(config.caches.len(), 1);
        let a = config.cache("a").unwrap();
        assert_eq!(a.max_cache_size, 5);
        assert!(a.disable_shared_cache);
        assert!(config.validate().is_ok());
    }
}
