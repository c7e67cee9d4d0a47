//! Configuration module.
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::counts::{GuildId, ResolverConfig};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Newline-delimited JSON feed to replay. Stdin when unset.
    pub feed_path: Option<PathBuf>,

    /// Guilds to resolve once the feed is running (comma-separated).
    pub query_guilds: Vec<GuildId>,

    /// How long a resolve waits for its member list update.
    pub resolve_timeout: Duration,

    /// Share one fetch between concurrent resolves of the same guild.
    pub coalesce_requests: bool,

    /// Maximum number of guilds kept in the member count store.
    pub store_capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_path: None,
            query_guilds: Vec::new(),
            resolve_timeout: Duration::from_secs(15),
            coalesce_requests: true,
            store_capacity: 100_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Invalid values are logged and replaced by their defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let feed_path = lookup("FEED_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        // Parse guild IDs
        let query_guilds = lookup("QUERY_GUILDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(GuildId::from)
            .collect();

        let resolve_timeout = parse_or("RESOLVE_TIMEOUT_SECS", lookup("RESOLVE_TIMEOUT_SECS"))
            .map(Duration::from_secs)
            .unwrap_or(defaults.resolve_timeout);

        let coalesce_requests = lookup("COALESCE_REQUESTS")
            .and_then(|raw| match parse_bool(&raw) {
                Some(value) => Some(value),
                None => {
                    warn!("Ignoring invalid COALESCE_REQUESTS value: {}", raw);
                    None
                }
            })
            .unwrap_or(defaults.coalesce_requests);

        let store_capacity = parse_or("STORE_CAPACITY", lookup("STORE_CAPACITY"))
            .unwrap_or(defaults.store_capacity);

        Self {
            feed_path,
            query_guilds,
            resolve_timeout,
            coalesce_requests,
            store_capacity,
        }
    }

    pub fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            timeout: self.resolve_timeout,
            coalesce: self.coalesce_requests,
        }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {} value: {}", key, raw);
            None
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
