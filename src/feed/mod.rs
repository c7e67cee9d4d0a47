//! Feed replay.
//!
//! Reads newline-delimited JSON gateway events and dispatches them in order.
//! Each line is either a full event (`{"t": "GUILD_MEMBER_LIST_UPDATE", "d": {...}}`)
//! or a bare member list update object.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::counts::MemberListUpdate;
use crate::events::{Dispatcher, GatewayEvent};

/// Outcome of a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub dispatched: u64,
    pub skipped: u64,
}

/// Open the feed at `path`, or stdin when no path is configured.
pub async fn open(path: Option<&Path>) -> Result<Box<dyn AsyncBufRead + Send + Unpin>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open feed {}", path.display()))?;
            info!("Replaying feed from {}", path.display());
            Ok(Box::new(BufReader::new(file)))
        }
        None => {
            info!("Replaying feed from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

/// Dispatch every event in `reader` until EOF.
///
/// Lines that don't parse are logged and counted, they never stop the replay.
pub async fn replay<R>(reader: R, dispatcher: &Dispatcher) -> Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = FeedStats::default();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await.context("failed to read feed")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_event(line) {
            Ok(event) => {
                dispatcher.dispatch(&event);
                stats.dispatched += 1;
            }
            Err(e) => {
                warn!("Skipping feed line {}: {}", line_no, e);
                stats.skipped += 1;
            }
        }
    }

    debug!("Feed replay finished: {:?}", stats);
    Ok(stats)
}

/// Lines carrying a `"t"` key are full events and report their own error.
/// Anything else is read as a bare update.
fn parse_event(line: &str) -> serde_json::Result<GatewayEvent> {
    let value: Value = serde_json::from_str(line)?;

    if value.get("t").is_some() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value::<MemberListUpdate>(value).map(GatewayEvent::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRegistry;
    use crate::counts::{GuildId, MemberCountStore};
    use crate::events::ingestion;

    const FEED: &str = r#"
{"t":"GUILD_MEMBER_LIST_UPDATE","d":{"guildId":"G1","memberCount":10,"groups":[{"id":"online","count":6},{"id":"offline","count":4}]}}
not json at all
{"guildId":"G2","memberCount":5,"groups":[{"id":"online","count":2}]}

{"t":"GUILD_MEMBER_LIST_UPDATE","d":{"guildId":"G1","memberCount":11,"groups":[{"id":"online","count":7}]}}
"#;

    #[tokio::test]
    async fn test_replay_dispatches_in_order() {
        let dispatcher = Dispatcher::new();
        let store = MemberCountStore::new(&CacheRegistry::new(), 10);
        let handle = ingestion::start(&dispatcher, store.clone());

        let stats = replay(FEED.as_bytes(), &dispatcher).await.unwrap();

        assert_eq!(
            stats,
            FeedStats {
                dispatched: 3,
                skipped: 1,
            }
        );
        assert_eq!(store.get(&GuildId::from("G1")).map(|c| c.online_count), Some(7));
        assert_eq!(store.get(&GuildId::from("G2")).map(|c| c.online_count), Some(2));
        assert!(handle.stop());
    }

    #[test]
    fn test_parse_event_accepts_both_shapes() {
        let wrapped = parse_event(
            r#"{"t":"GUILD_MEMBER_LIST_UPDATE","d":{"guildId":"G1","memberCount":1,"groups":[]}}"#,
        )
        .unwrap();
        let bare = parse_event(r#"{"guildId":"G1","memberCount":1,"groups":[]}"#).unwrap();

        assert_eq!(wrapped, bare);
    }

    #[test]
    fn test_parse_event_reports_wrapped_error() {
        let unknown = parse_event(r#"{"t":"TYPING_START","d":{}}"#).unwrap_err();
        assert!(unknown.to_string().contains("unknown variant"), "{unknown}");

        let incomplete =
            parse_event(r#"{"t":"GUILD_MEMBER_LIST_UPDATE","d":{"memberCount":1}}"#).unwrap_err();
        assert!(incomplete.to_string().contains("guildId"), "{incomplete}");
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let err = open(Some(Path::new("/nonexistent/feed.jsonl"))).await.err().unwrap();
        assert!(err.to_string().contains("failed to open feed"));
    }
}
