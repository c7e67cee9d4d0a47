//! Member list providers.

use dashmap::DashMap;
use tracing::info;

use super::model::GuildId;

/// Outbound side of the member list feed.
///
/// `request_members` is fire-and-forget: the answer, if any, arrives later as
/// a `GUILD_MEMBER_LIST_UPDATE` event on the dispatcher.
pub trait MemberListProvider: Send + Sync {
    fn request_members(&self, guild_id: &GuildId);
}

/// Provider used when updates come from a replayed feed.
///
/// It cannot fetch anything itself, so it records and logs each request.
#[derive(Debug, Default)]
pub struct FeedProvider {
    requests: DashMap<GuildId, u64>,
}

impl FeedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of member requests issued for `guild_id` so far.
    #[allow(dead_code)]
    pub fn requests_for(&self, guild_id: &GuildId) -> u64 {
        self.requests.get(guild_id).map(|count| *count).unwrap_or(0)
    }

    pub fn total_requests(&self) -> u64 {
        self.requests.iter().map(|entry| *entry.value()).sum()
    }
}

impl MemberListProvider for FeedProvider {
    fn request_members(&self, guild_id: &GuildId) {
        *self.requests.entry(guild_id.clone()).or_insert(0) += 1;
        info!("Requested member list for guild {}", guild_id);
    }
}
