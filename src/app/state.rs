//! Shared application state.
//!
//! Owns the member count store, the event dispatcher and the resolver, and
//! defines the order they come up and go down in.

use std::sync::Arc;

use tracing::info;

use crate::cache::CacheRegistry;
use crate::config::Config;
use crate::counts::{CountResolver, FeedProvider, MemberCountStore};
use crate::events::ingestion::{self, IngestionHandle};
use crate::events::Dispatcher;

pub struct AppState {
    /// Cache registry the store lives in.
    pub cache: CacheRegistry,

    /// Last known counts per guild.
    pub store: MemberCountStore,

    /// Dispatcher the member list updates arrive on.
    pub dispatcher: Dispatcher,

    /// Outbound member list requests.
    pub provider: Arc<FeedProvider>,

    /// Consumer-facing count lookups.
    pub resolver: CountResolver,

    ingestion: IngestionHandle,
}

impl AppState {
    /// Bring up the store, dispatcher and resolver.
    ///
    /// Ingestion is registered before the resolver exists, so every update
    /// reaches the store ahead of any one-shot listener.
    pub fn init(config: &Config) -> Self {
        let cache = CacheRegistry::new();
        let store = MemberCountStore::new(&cache, config.store_capacity);
        let dispatcher = Dispatcher::new();
        let ingestion = ingestion::start(&dispatcher, store.clone());

        let provider = Arc::new(FeedProvider::new());
        let resolver = CountResolver::new(
            store.clone(),
            dispatcher.clone(),
            provider.clone(),
            config.resolver(),
        );

        info!(
            "Member counts ready (timeout {:?}, coalescing {})",
            config.resolve_timeout, config.coalesce_requests
        );

        Self {
            cache,
            store,
            dispatcher,
            provider,
            resolver,
            ingestion,
        }
    }

    /// Tear down in reverse order: ingestion, remaining listeners, store.
    pub fn shutdown(self) {
        self.ingestion.stop();
        self.dispatcher.clear();
        self.store.dispose();
        info!("Shut down (caches left: {:?})", self.cache.cache_names());
    }
}
