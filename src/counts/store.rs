//! Member count store.
//!
//! Holds the last known counts per guild. Written only by processed member
//! list updates, read synchronously by the resolver.

use tracing::debug;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};

use super::model::{CountsError, GuildId, MemberCounts, MemberListUpdate};

/// Registry name of the backing cache.
const CACHE_NAME: &str = "member_counts";

/// Process-wide mapping from guild to its latest [`MemberCounts`].
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Clone, Debug)]
pub struct MemberCountStore {
    registry: CacheRegistry,
    cache: TypedCache<GuildId, MemberCounts>,
}

impl MemberCountStore {
    pub fn new(registry: &CacheRegistry, capacity: u64) -> Self {
        let cache = registry.get_or_create(CACHE_NAME, CacheConfig::with_capacity(capacity));

        Self {
            registry: registry.clone(),
            cache,
        }
    }

    pub fn get(&self, guild_id: &GuildId) -> Option<MemberCounts> {
        self.cache.get(guild_id)
    }

    /// Insert or overwrite the record for `counts.guild_id`.
    pub fn update(&self, counts: MemberCounts) {
        debug!(
            "Member counts for guild {}: {} members, {} online",
            counts.guild_id, counts.member_count, counts.online_count
        );
        self.cache.insert(counts.guild_id.clone(), counts);
    }

    /// Convert a raw update and store it.
    ///
    /// On error nothing is written and the previous record stays in place.
    pub fn apply(&self, update: &MemberListUpdate) -> Result<MemberCounts, CountsError> {
        let counts = MemberCounts::try_from(update)?;
        self.update(counts.clone());
        Ok(counts)
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Drop every record and unregister the backing cache.
    pub fn dispose(&self) {
        self.cache.invalidate_all();
        self.registry.remove(self.cache.name());
        debug!("Member count store disposed");
    }
}
