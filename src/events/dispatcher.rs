//! In-process event dispatcher.
//!
//! Listeners are plain callbacks invoked synchronously, one event at a time,
//! in registration order. A listener decides after each event whether it
//! stays registered, which is how one-shot listeners remove themselves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::counts::{GuildId, MemberListUpdate};

/// Events delivered by the host gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEvent {
    GuildMemberListUpdate(MemberListUpdate),
}

impl GatewayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GuildMemberListUpdate(_) => "GUILD_MEMBER_LIST_UPDATE",
        }
    }

    pub fn guild_id(&self) -> &GuildId {
        match self {
            Self::GuildMemberListUpdate(update) => &update.guild_id,
        }
    }
}

impl From<MemberListUpdate> for GatewayEvent {
    fn from(update: MemberListUpdate) -> Self {
        Self::GuildMemberListUpdate(update)
    }
}

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What a listener wants after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerControl {
    Keep,
    Remove,
}

type Listener = Box<dyn FnMut(&GatewayEvent) -> ListenerControl + Send>;

/// The listener was dropped before a matching event arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("listener removed before a matching event arrived")]
pub struct Disconnected;

struct DispatcherInner {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

/// Synchronous, listener-based event dispatcher.
///
/// The listener list stays locked for the whole of a dispatch, so dispatches
/// never interleave and every listener sees events in delivery order.
/// Listeners must not call back into the dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener for every subsequent event.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: FnMut(&GatewayEvent) -> ListenerControl + Send + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, Box::new(listener)));
        trace!("Registered listener {:?}", id);
        id
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = {
            let mut listeners = self.inner.listeners.lock();
            listeners
                .iter()
                .position(|(listener_id, _)| *listener_id == id)
                .map(|index| listeners.remove(index))
        };

        trace!("Unregistered listener {:?} (found: {})", id, removed.is_some());
        removed.is_some()
    }

    /// Deliver an event to every listener.
    pub fn dispatch(&self, event: &GatewayEvent) {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();

        listeners.retain_mut(|(_, listener)| listener(event) == ListenerControl::Keep);

        debug!(
            "Dispatched {} for guild {} to {} listeners ({} removed)",
            event.name(),
            event.guild_id(),
            before,
            before - listeners.len()
        );
    }

    /// Wait for the next event `matcher` maps to a value.
    ///
    /// The listener is registered before this returns, so events dispatched
    /// right after the call are not missed even if the future has not been
    /// polled yet. It is removed after the first match, or when the returned
    /// future is dropped.
    pub fn next_matching<T, F>(&self, mut matcher: F) -> PendingEvent<T>
    where
        T: Send + 'static,
        F: FnMut(&GatewayEvent) -> Option<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);

        let id = self.subscribe(move |event| {
            // Nobody is waiting anymore.
            if tx.as_ref().is_none_or(|sender| sender.is_closed()) {
                return ListenerControl::Remove;
            }

            match matcher(event) {
                Some(value) => {
                    if let Some(sender) = tx.take() {
                        let _ = sender.send(value);
                    }
                    ListenerControl::Remove
                }
                None => ListenerControl::Keep,
            }
        });

        PendingEvent {
            rx,
            id,
            dispatcher: self.clone(),
            settled: false,
        }
    }

    /// Drop every listener. Pending [`next_matching`](Self::next_matching)
    /// futures resolve to [`Disconnected`].
    pub fn clear(&self) {
        let listeners = std::mem::take(&mut *self.inner.listeners.lock());
        debug!("Cleared {} listeners", listeners.len());
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

/// Future returned by [`Dispatcher::next_matching`].
#[must_use = "the listener is removed as soon as this is dropped"]
pub struct PendingEvent<T> {
    rx: oneshot::Receiver<T>,
    id: ListenerId,
    dispatcher: Dispatcher,
    settled: bool,
}

impl<T> Future for PendingEvent<T> {
    type Output = Result<T, Disconnected>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result.map_err(|_| Disconnected),
        };

        self.settled = true;
        Poll::Ready(result)
    }
}

impl<T> Drop for PendingEvent<T> {
    fn drop(&mut self) {
        if !self.settled {
            self.dispatcher.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures::FutureExt;

    use super::*;
    use crate::counts::MemberListGroup;

    fn event(guild: &str, members: u64) -> GatewayEvent {
        MemberListUpdate::new(guild, members, vec![MemberListGroup::new("online", 1)]).into()
    }

    #[test]
    fn test_listeners_run_in_order() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            dispatcher.subscribe(move |_| {
                seen.lock().push(tag);
                ListenerControl::Keep
            });
        }

        dispatcher.dispatch(&event("G1", 1));
        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_remove_control_unregisters() {
        let dispatcher = Dispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        dispatcher.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            ListenerControl::Remove
        });

        dispatcher.dispatch(&event("G1", 1));
        dispatcher.dispatch(&event("G1", 2));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let dispatcher = Dispatcher::new();
        let id = dispatcher.subscribe(|_| ListenerControl::Keep);

        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_next_matching_skips_other_events() {
        let dispatcher = Dispatcher::new();
        let target = GuildId::from("G1");

        let mut pending = dispatcher.next_matching(move |event| {
            (event.guild_id() == &target).then(|| event.clone())
        });

        dispatcher.dispatch(&event("G2", 5));
        assert!((&mut pending).now_or_never().is_none());
        assert_eq!(dispatcher.listener_count(), 1);

        dispatcher.dispatch(&event("G1", 7));
        assert_eq!(dispatcher.listener_count(), 0);
        assert_eq!(pending.await, Ok(event("G1", 7)));
    }

    #[tokio::test]
    async fn test_next_matching_fires_once() {
        let dispatcher = Dispatcher::new();
        let pending = dispatcher.next_matching(|event| Some(event.clone()));

        dispatcher.dispatch(&event("G1", 1));
        dispatcher.dispatch(&event("G1", 2));

        assert_eq!(pending.await, Ok(event("G1", 1)));
    }

    #[test]
    fn test_dropping_pending_unregisters() {
        let dispatcher = Dispatcher::new();
        let pending = dispatcher.next_matching(|_| Some(()));
        assert_eq!(dispatcher.listener_count(), 1);

        drop(pending);
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_disconnects_pending() {
        let dispatcher = Dispatcher::new();
        let pending = dispatcher.next_matching(|_| Some(()));

        dispatcher.clear();
        assert_eq!(pending.await, Err(Disconnected));
    }

    #[test]
    fn test_event_wire_format() {
        let json = r#"{"t":"GUILD_MEMBER_LIST_UPDATE","d":{"guildId":"G1","memberCount":3,"groups":[{"id":"online","count":1}]}}"#;

        let parsed: GatewayEvent = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, event("G1", 3));
        assert_eq!(parsed.name(), "GUILD_MEMBER_LIST_UPDATE");
    }
}
