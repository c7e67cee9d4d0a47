//! Cache configuration.

/// Configuration for a cache instance.
///
/// Entries never expire on time; they stay until overwritten, evicted for
/// capacity, or the whole cache is invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,
}

impl CacheConfig {
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self { max_capacity }
    }
}
