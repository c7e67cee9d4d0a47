//! Guild Profile - Member count resolver
//!
//! Resolves per-guild member and online counts from the member list update
//! feed, caching the latest counts and coalescing concurrent lookups.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `cache` - Named caches with Moka
//! - `counts` - Count model, store, provider and resolver
//! - `events` - Event dispatcher and update ingestion
//! - `feed` - Newline-delimited JSON feed replay
//! - `app` - State wiring and run loop

mod app;
mod cache;
mod config;
mod counts;
mod events;
mod feed;

use tracing::info;
use tracing_subscriber::EnvFilter;

use app::AppState;
use config::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("guild_profile=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting guild profile...");

    let config = Config::from_env();
    info!("Configuration loaded successfully");

    if config.query_guilds.is_empty() {
        info!("No guilds to resolve (QUERY_GUILDS is empty), only warming the cache");
    } else {
        info!("Resolving guilds: {:?}", config.query_guilds);
    }

    let state = AppState::init(&config);

    let result = app::run(&config, &state).await;

    state.shutdown();
    result
}
