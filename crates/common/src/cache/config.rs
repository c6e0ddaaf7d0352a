//! Shared cache configuration types and builder

/// Eviction policy applied when a bounded shared cache is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Least Recently Used - evicts the least recently read or written entry
    #[default]
    LRU,
    /// First In First Out - evicts the oldest entry by insertion time
    FIFO,
    /// No automatic eviction; inserts beyond `max_size` are still accepted
    None,
}

impl_state_names!(EvictionPolicy {
    LRU => "lru",
    FIFO => "fifo",
    None => "none",
});

/// Configuration for a [`MemoryCache`](super::MemoryCache)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Name used in log fields and backend errors
    pub name: String,

    /// Maximum number of entries (None = unlimited)
    pub max_size: Option<usize>,

    /// Eviction policy when max_size is reached
    pub eviction_policy: EvictionPolicy,

    /// Whether to collect hit/miss statistics
    pub track_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "shared".to_string(),
            max_size: None,
            eviction_policy: EvictionPolicy::LRU,
            track_metrics: false,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Unbounded cache with the given name
    ///
    /// # Example
    /// ```
    /// use repocache_common::cache::CacheConfig;
    ///
    /// let config = CacheConfig::unbounded("aclCache");
    /// assert!(config.max_size.is_none());
    /// ```
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self { name: name.into(), eviction_policy: EvictionPolicy::None, ..Self::default() }
    }

    /// LRU-bounded cache with the given name
    ///
    /// # Example
    /// ```
    /// use repocache_common::cache::CacheConfig;
    ///
    /// let config = CacheConfig::lru("nodeCache", 1000);
    /// assert_eq!(config.max_size, Some(1000));
    /// ```
    pub fn lru(name: impl Into<String>, max_size: usize) -> Self {
        Self {
            name: name.into(),
            max_size: Some(max_size),
            eviction_policy: EvictionPolicy::LRU,
            track_metrics: false,
        }
    }
}

/// Builder for CacheConfig with fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set maximum number of entries
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = Some(size);
        self
    }

    /// Set eviction policy
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    /// Enable or disable metrics tracking
    pub fn track_metrics(mut self, enabled: bool) -> Self {
        self.config.track_metrics = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
