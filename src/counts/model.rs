//! Member count data types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Group id the host uses for members that are not online.
pub const OFFLINE_GROUP_ID: &str = "offline";

/// Guild identifier (snowflake kept as text, the way the gateway sends it).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(String);

impl GuildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[allow(dead_code)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GuildId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for GuildId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One sub-group of a member list update (a role group, "online" or "offline").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberListGroup {
    pub id: String,
    pub count: u64,
}

impl MemberListGroup {
    #[allow(dead_code)]
    pub fn new(id: impl Into<String>, count: u64) -> Self {
        Self {
            id: id.into(),
            count,
        }
    }

    fn is_offline(&self) -> bool {
        self.id == OFFLINE_GROUP_ID
    }
}

/// Raw `GUILD_MEMBER_LIST_UPDATE` payload.
///
/// Only the fields needed for counting are kept; everything else the host
/// sends (ops, list id, ...) is ignored during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberListUpdate {
    pub guild_id: GuildId,
    pub member_count: u64,
    /// Missing on malformed payloads.
    #[serde(default)]
    pub groups: Option<Vec<MemberListGroup>>,
}

impl MemberListUpdate {
    #[allow(dead_code)]
    pub fn new(
        guild_id: impl Into<GuildId>,
        member_count: u64,
        groups: Vec<MemberListGroup>,
    ) -> Self {
        Self {
            guild_id: guild_id.into(),
            member_count,
            groups: Some(groups),
        }
    }

    /// Sum of every group count except the offline group.
    pub fn online_count(&self) -> Result<u64, CountsError> {
        let groups = self
            .groups
            .as_ref()
            .ok_or_else(|| CountsError::MissingGroups(self.guild_id.clone()))?;

        groups
            .iter()
            .filter(|group| !group.is_offline())
            .try_fold(0u64, |total, group| total.checked_add(group.count))
            .ok_or_else(|| CountsError::CountOverflow(self.guild_id.clone()))
    }
}

/// Last known member counts for a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCounts {
    pub guild_id: GuildId,
    pub member_count: u64,
    pub online_count: u64,
}

impl TryFrom<&MemberListUpdate> for MemberCounts {
    type Error = CountsError;

    fn try_from(update: &MemberListUpdate) -> Result<Self, Self::Error> {
        let online_count = update.online_count()?;

        if online_count > update.member_count {
            return Err(CountsError::OnlineExceedsTotal {
                guild_id: update.guild_id.clone(),
                online: online_count,
                total: update.member_count,
            });
        }

        Ok(Self {
            guild_id: update.guild_id.clone(),
            member_count: update.member_count,
            online_count,
        })
    }
}

/// Reasons an update cannot be turned into [`MemberCounts`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountsError {
    #[error("member list update for guild {0} has no groups")]
    MissingGroups(GuildId),

    #[error("member list update for guild {0} has group counts that overflow")]
    CountOverflow(GuildId),

    #[error("member list update for guild {guild_id} reports {online} online out of {total}")]
    OnlineExceedsTotal {
        guild_id: GuildId,
        online: u64,
        total: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_count_excludes_offline_group() {
        let update = MemberListUpdate::new(
            "G1",
            10,
            vec![
                MemberListGroup::new("online", 6),
                MemberListGroup::new("offline", 4),
            ],
        );

        let counts = MemberCounts::try_from(&update).unwrap();

        assert_eq!(
            counts,
            MemberCounts {
                guild_id: GuildId::from("G1"),
                member_count: 10,
                online_count: 6,
            }
        );
    }

    #[test]
    fn test_online_count_sums_role_groups() {
        let update = MemberListUpdate::new(
            "G1",
            50,
            vec![
                MemberListGroup::new("123456789", 3),
                MemberListGroup::new("987654321", 7),
                MemberListGroup::new("online", 12),
                MemberListGroup::new("offline", 28),
            ],
        );

        let counts = MemberCounts::try_from(&update).unwrap();
        assert_eq!(counts.online_count, 22);
        assert!(counts.online_count <= counts.member_count);
    }

    #[test]
    fn test_large_guild_without_offline_group() {
        let update = MemberListUpdate::new("G1", 5000, vec![MemberListGroup::new("online", 800)]);
        assert_eq!(MemberCounts::try_from(&update).unwrap().online_count, 800);
    }

    #[test]
    fn test_missing_groups_is_rejected() {
        let update: MemberListUpdate =
            serde_json::from_str(r#"{"guildId":"G9","memberCount":3}"#).unwrap();

        assert_eq!(
            MemberCounts::try_from(&update),
            Err(CountsError::MissingGroups(GuildId::from("G9")))
        );
    }

    #[test]
    fn test_online_above_total_is_rejected() {
        let update = MemberListUpdate::new("G1", 2, vec![MemberListGroup::new("online", 3)]);
        assert!(matches!(
            MemberCounts::try_from(&update),
            Err(CountsError::OnlineExceedsTotal { online: 3, total: 2, .. })
        ));
    }

    #[test]
    fn test_group_count_overflow_is_rejected() {
        let update: MemberListUpdate = serde_json::from_str(
            r#"{"guildId":"G1","memberCount":5,"groups":[{"id":"a","count":18446744073709551615},{"id":"b","count":3}]}"#,
        )
        .unwrap();

        assert_eq!(
            MemberCounts::try_from(&update),
            Err(CountsError::CountOverflow(GuildId::from("G1")))
        );
    }

    #[test]
    fn test_deserialize_ignores_extra_fields() {
        let json = r#"{
            "guildId": "81384788765712384",
            "id": "everyone",
            "memberCount": 4,
            "onlineCount": 1,
            "ops": [],
            "groups": [{"id": "online", "count": 1}, {"id": "offline", "count": 3}]
        }"#;

        let update: MemberListUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.guild_id.as_str(), "81384788765712384");
        assert_eq!(update.online_count(), Ok(1));
    }
}
