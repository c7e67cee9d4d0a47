//! Cache registry - Central management for all caches.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::{CacheConfig, TypedCache};

/// Central registry for managing multiple typed caches.
///
/// Components create and access their caches by name, which keeps every
/// piece of in-memory state in one place for disposal.
///
/// ## Example
///
/// ```rust
/// let registry = CacheRegistry::new();
///
/// let counts: TypedCache<GuildId, MemberCounts> =
///     registry.get_or_create("member_counts", CacheConfig::with_capacity(100_000));
///
/// // Later, the same name hands back the same cache
/// let again: TypedCache<GuildId, MemberCounts> =
///     registry.get_or_create("member_counts", CacheConfig::with_capacity(10_000));
/// ```
#[derive(Clone)]
pub struct CacheRegistry {
    caches: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

/// Internal cache entry storing type-erased cache.
struct CacheEntry {
    cache: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl CacheRegistry {
    /// Create a new empty cache registry.
    pub fn new() -> Self {
        info!("Cache registry initialized");
        Self {
            caches: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get an existing cache or create a new one if it doesn't exist.
    ///
    /// `config` is only used when the cache is created.
    ///
    /// # Panics
    /// Panics if a cache with the same name but different types already exists.
    pub fn get_or_create<K, V>(&self, name: &str, config: CacheConfig) -> TypedCache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut caches = self.caches.write();

        if let Some(existing) = caches.get(name) {
            return match existing.cache.downcast_ref::<TypedCache<K, V>>() {
                Some(cache) => cache.clone(),
                None => panic!(
                    "Cache '{}' already exists with different types: expected {}, got {}",
                    name,
                    std::any::type_name::<TypedCache<K, V>>(),
                    existing.type_name
                ),
            };
        }

        debug!("Creating cache: {}", name);

        let cache = TypedCache::new(name, config);
        caches.insert(
            name.to_string(),
            CacheEntry {
                cache: Box::new(cache.clone()),
                type_name: std::any::type_name::<TypedCache<K, V>>(),
            },
        );

        cache
    }

    /// Remove a cache from the registry.
    ///
    /// Handles already given out keep working but are no longer shared
    /// with later `get_or_create` calls. Returns `true` if the cache was removed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.caches.write().remove(name).is_some();
        if removed {
            debug!("Removed cache: {}", name);
        }
        removed
    }

    /// Get a list of all registered cache names.
    pub fn cache_names(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let caches = self.caches.read();
        f.debug_struct("CacheRegistry")
            .field("cache_count", &caches.len())
            .field("cache_names", &caches.keys().collect::<Vec<_>>())
            .finish()
    }
}
