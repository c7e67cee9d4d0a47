//! Member list update ingestion.
//!
//! Keeps the member count store warm for every guild the host streams
//! updates for, independent of any explicit resolve call.

use tracing::{info, warn};

use crate::counts::MemberCountStore;

use super::dispatcher::{Dispatcher, GatewayEvent, ListenerControl, ListenerId};

/// Registration of the always-on ingestion listener.
///
/// Must be stopped at shutdown; dropping the handle leaves the listener in place.
#[derive(Debug)]
#[must_use = "the ingestion listener stays registered until `stop` is called"]
pub struct IngestionHandle {
    dispatcher: Dispatcher,
    id: ListenerId,
}

/// Register the ingestion listener.
///
/// Malformed updates are logged and skipped; the listener never removes itself.
pub fn start(dispatcher: &Dispatcher, store: MemberCountStore) -> IngestionHandle {
    let id = dispatcher.subscribe(move |event| {
        match event {
            GatewayEvent::GuildMemberListUpdate(update) => {
                if let Err(e) = store.apply(update) {
                    warn!("Skipping member list update: {}", e);
                }
            }
        }
        ListenerControl::Keep
    });

    info!("Member list ingestion started");

    IngestionHandle {
        dispatcher: dispatcher.clone(),
        id,
    }
}

impl IngestionHandle {
    /// Unregister the listener. Returns `false` if it had already been removed
    /// (e.g. by [`Dispatcher::clear`]).
    pub fn stop(self) -> bool {
        let removed = self.dispatcher.unsubscribe(self.id);
        info!("Member list ingestion stopped");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRegistry;
    use crate::counts::{GuildId, MemberCounts, MemberListGroup, MemberListUpdate};

    fn setup() -> (Dispatcher, MemberCountStore) {
        (
            Dispatcher::new(),
            MemberCountStore::new(&CacheRegistry::new(), 100),
        )
    }

    fn update(guild: &str, members: u64, online: u64) -> GatewayEvent {
        MemberListUpdate::new(
            guild,
            members,
            vec![
                MemberListGroup::new("online", online),
                MemberListGroup::new("offline", members - online),
            ],
        )
        .into()
    }

    #[test]
    fn test_ingests_every_guild() {
        let (dispatcher, store) = setup();
        let handle = start(&dispatcher, store.clone());

        dispatcher.dispatch(&update("G1", 10, 6));
        dispatcher.dispatch(&update("G2", 4, 1));
        dispatcher.dispatch(&update("G1", 12, 7));

        assert_eq!(
            store.get(&GuildId::from("G1")),
            Some(MemberCounts {
                guild_id: GuildId::from("G1"),
                member_count: 12,
                online_count: 7,
            })
        );
        assert_eq!(store.get(&GuildId::from("G2")).map(|c| c.online_count), Some(1));
        assert!(handle.stop());
    }

    #[test]
    fn test_malformed_update_keeps_listener_and_record() {
        let (dispatcher, store) = setup();
        let _handle = start(&dispatcher, store.clone());

        dispatcher.dispatch(&update("G1", 10, 6));
        dispatcher.dispatch(&GatewayEvent::GuildMemberListUpdate(MemberListUpdate {
            guild_id: GuildId::from("G1"),
            member_count: 11,
            groups: None,
        }));

        assert_eq!(dispatcher.listener_count(), 1);
        assert_eq!(store.get(&GuildId::from("G1")).map(|c| c.member_count), Some(10));

        dispatcher.dispatch(&update("G1", 11, 5));
        assert_eq!(store.get(&GuildId::from("G1")).map(|c| c.member_count), Some(11));
    }

    #[test]
    fn test_overflowing_update_keeps_listener_and_record() {
        let (dispatcher, store) = setup();
        let _handle = start(&dispatcher, store.clone());

        dispatcher.dispatch(&update("G1", 10, 6));
        dispatcher.dispatch(&GatewayEvent::GuildMemberListUpdate(MemberListUpdate::new(
            "G1",
            5,
            vec![
                MemberListGroup::new("a", u64::MAX),
                MemberListGroup::new("b", 3),
            ],
        )));

        assert_eq!(dispatcher.listener_count(), 1);
        assert_eq!(store.get(&GuildId::from("G1")).map(|c| c.online_count), Some(6));

        dispatcher.dispatch(&update("G1", 12, 8));
        assert_eq!(store.get(&GuildId::from("G1")).map(|c| c.online_count), Some(8));
    }

    #[test]
    fn test_stop_removes_only_ingestion() {
        let (dispatcher, store) = setup();
        dispatcher.subscribe(|_| ListenerControl::Keep);
        let handle = start(&dispatcher, store.clone());
        assert_eq!(dispatcher.listener_count(), 2);

        assert!(handle.stop());
        assert_eq!(dispatcher.listener_count(), 1);

        dispatcher.dispatch(&update("G1", 10, 6));
        assert_eq!(store.get(&GuildId::from("G1")), None);
    }
}
