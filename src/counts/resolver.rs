//! Member count resolver.
//!
//! Answers "how many members / online in guild G" from the store when it
//! can, otherwise asks the provider for the member list and waits for the
//! matching update event. Concurrent misses for the same guild share one
//! fetch and one listener unless coalescing is turned off.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{self, BoxFuture, FutureExt, WeakShared};
use thiserror::Error;
use tokio::time;
use tracing::{debug, warn};

use crate::events::dispatcher::{Dispatcher, GatewayEvent, PendingEvent};

use super::model::{GuildId, MemberCounts};
use super::provider::MemberListProvider;
use super::store::MemberCountStore;

/// Future returned by [`CountResolver::resolve`].
pub type ResolveFuture = BoxFuture<'static, Result<MemberCounts, ResolveError>>;

/// Why a resolve call finished without counts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no member list update for guild {guild_id} within {timeout:?}")]
    Timeout { guild_id: GuildId, timeout: Duration },

    #[error("event dispatcher shut down before guild {0} was updated")]
    Disconnected(GuildId),
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How long to wait for the update event after requesting members.
    pub timeout: Duration,
    /// Share one fetch between concurrent misses for the same guild.
    pub coalesce: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            coalesce: true,
        }
    }
}

/// In-flight request for a guild. Held weakly so callers that give up
/// take the listener down with them.
struct InFlight {
    generation: u64,
    request: WeakShared<ResolveFuture>,
}

struct ResolverInner {
    store: MemberCountStore,
    dispatcher: Dispatcher,
    provider: Arc<dyn MemberListProvider>,
    config: ResolverConfig,
    in_flight: DashMap<GuildId, InFlight>,
    next_generation: AtomicU64,
}

enum Listen {
    Cached(MemberCounts),
    Waiting(PendingEvent<MemberCounts>),
}

/// Resolves member counts per guild. Cheap to clone.
#[derive(Clone)]
pub struct CountResolver {
    inner: Arc<ResolverInner>,
}

impl CountResolver {
    pub fn new(
        store: MemberCountStore,
        dispatcher: Dispatcher,
        provider: Arc<dyn MemberListProvider>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                store,
                dispatcher,
                provider,
                config,
                in_flight: DashMap::new(),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Resolve the member counts of `guild_id`.
    ///
    /// A cached record comes back as an already-completed future. On a miss
    /// the update listener is registered and the member list requested
    /// before this returns; the future completes with the first matching
    /// update, or fails after the configured timeout. Dropping the future
    /// before then unregisters the listener (once every joiner is gone).
    pub fn resolve(&self, guild_id: &GuildId) -> ResolveFuture {
        if let Some(counts) = self.inner.store.get(guild_id) {
            debug!("Member count cache hit for guild {}", guild_id);
            return future::ready(Ok(counts)).boxed();
        }

        debug!("Member count cache miss for guild {}", guild_id);

        if self.inner.config.coalesce {
            self.resolve_shared(guild_id)
        } else {
            self.resolve_single(guild_id)
        }
    }

    /// Number of guilds with a request currently tracked for coalescing.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    fn resolve_single(&self, guild_id: &GuildId) -> ResolveFuture {
        let pending = match self.listen(guild_id) {
            Listen::Cached(counts) => return future::ready(Ok(counts)).boxed(),
            Listen::Waiting(pending) => pending,
        };

        let request = self.settle(guild_id, pending, None);
        self.inner.provider.request_members(guild_id);
        request
    }

    fn resolve_shared(&self, guild_id: &GuildId) -> ResolveFuture {
        let shared = {
            let entry = self.inner.in_flight.entry(guild_id.clone());

            if let Entry::Occupied(ref occupied) = entry
                && let Some(shared) = occupied.get().request.upgrade()
            {
                debug!("Joining in-flight member count request for guild {}", guild_id);
                return shared.boxed();
            }

            let pending = match self.listen(guild_id) {
                Listen::Cached(counts) => {
                    if let Entry::Occupied(stale) = entry {
                        stale.remove();
                    }
                    return future::ready(Ok(counts)).boxed();
                }
                Listen::Waiting(pending) => pending,
            };

            let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
            let shared = self.settle(guild_id, pending, Some(generation)).shared();

            // Not polled yet, so it cannot have completed.
            if let Some(request) = shared.downgrade() {
                entry.insert(InFlight {
                    generation,
                    request,
                });
            }

            shared
        };

        self.inner.provider.request_members(guild_id);
        shared.boxed()
    }

    /// Register the one-shot update listener for `guild_id`.
    fn listen(&self, guild_id: &GuildId) -> Listen {
        let store = self.inner.store.clone();
        let target = guild_id.clone();

        let pending = self.inner.dispatcher.next_matching(move |event| match event {
            GatewayEvent::GuildMemberListUpdate(update) if update.guild_id == target => {
                match store.apply(update) {
                    Ok(counts) => Some(counts),
                    Err(e) => {
                        warn!("Ignoring member list update while resolving: {}", e);
                        None
                    }
                }
            }
            _ => None,
        });

        // An update may have landed between the cache check and registration.
        match self.inner.store.get(guild_id) {
            Some(counts) => Listen::Cached(counts),
            None => Listen::Waiting(pending),
        }
    }

    /// Wrap the listener in the timeout and in-flight bookkeeping.
    fn settle(
        &self,
        guild_id: &GuildId,
        pending: PendingEvent<MemberCounts>,
        generation: Option<u64>,
    ) -> ResolveFuture {
        let inner = Arc::clone(&self.inner);
        let guild_id = guild_id.clone();

        async move {
            let timeout = inner.config.timeout;

            let outcome = match time::timeout(timeout, pending).await {
                Ok(Ok(counts)) => Ok(counts),
                Ok(Err(_)) => Err(ResolveError::Disconnected(guild_id.clone())),
                Err(_) => Err(ResolveError::Timeout {
                    guild_id: guild_id.clone(),
                    timeout,
                }),
            };

            if let Some(generation) = generation {
                inner
                    .in_flight
                    .remove_if(&guild_id, |_, entry| entry.generation == generation);
            }

            match &outcome {
                Ok(counts) => debug!(
                    "Resolved guild {}: {} members, {} online",
                    guild_id, counts.member_count, counts.online_count
                ),
                Err(e) => warn!("Member count request failed: {}", e),
            }

            outcome
        }
        .boxed()
    }
}

impl std::fmt::Debug for CountResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountResolver")
            .field("config", &self.inner.config)
            .field("in_flight", &self.inner.in_flight.len())
            .finish()
    }
}
