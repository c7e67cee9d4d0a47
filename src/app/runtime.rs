//! Run loop - Replays the feed and answers the configured queries.

use std::future::Future;

use futures::future::join_all;
use tokio::io::AsyncBufRead;
use tracing::{error, info, warn};

use super::AppState;
use crate::config::Config;
use crate::counts::GuildId;
use crate::feed;

/// Replay the configured feed while resolving every configured guild.
///
/// Ctrl+C stops waiting early, both for the queries and for the feed.
pub async fn run(config: &Config, state: &AppState) -> anyhow::Result<()> {
    let reader = feed::open(config.feed_path.as_deref()).await?;

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    run_until(state, &config.query_guilds, reader, interrupt).await
}

/// Resolve `guilds` while replaying `reader`, until the feed ends or
/// `interrupt` completes.
///
/// Resolves are started before the feed so their listeners catch the first
/// matching update.
async fn run_until<R, I>(
    state: &AppState,
    guilds: &[GuildId],
    reader: R,
    interrupt: I,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Send + Unpin + 'static,
    I: Future<Output = ()>,
{
    let requests: Vec<_> = guilds
        .iter()
        .map(|guild_id| {
            let request = state.resolver.resolve(guild_id);
            async move { (guild_id, request.await) }
        })
        .collect();

    let dispatcher = state.dispatcher.clone();
    let mut replay = tokio::spawn(async move { feed::replay(reader, &dispatcher).await });

    tokio::pin!(interrupt);

    tokio::select! {
        results = join_all(requests) => {
            for (guild_id, result) in results {
                match result {
                    Ok(counts) => info!(
                        "Guild {}: {} members, {} online",
                        guild_id, counts.member_count, counts.online_count
                    ),
                    Err(e) => warn!("Guild {}: {}", guild_id, e),
                }
            }
        }
        _ = &mut interrupt => {
            info!("Interrupted, abandoning {} pending requests", state.resolver.in_flight_count());
            replay.abort();
            return Ok(());
        }
    }

    let replayed = tokio::select! {
        joined = &mut replay => joined?,
        _ = &mut interrupt => {
            info!("Interrupted, stopping feed replay");
            replay.abort();
            return Ok(());
        }
    };

    match replayed {
        Ok(stats) => info!(
            "Feed done: {} events dispatched, {} lines skipped, {} guilds cached, {} member requests",
            stats.dispatched,
            stats.skipped,
            state.store.len(),
            state.provider.total_requests()
        ),
        Err(e) => error!("Feed replay failed: {:#}", e),
    }

    Ok(())
}
