//! Cache module - Named, typed caches backed by Moka.
//!
//! The member count store is one of these caches; anything else that needs
//! in-memory state keyed by guild should go through the registry too so it
//! can be disposed with the rest at shutdown.
//!
//! ## Usage
//!
//! ```rust
//! let registry = CacheRegistry::new();
//! let counts = registry.get_or_create::<GuildId, MemberCounts>(
//!     "member_counts",
//!     CacheConfig::with_capacity(100_000),
//! );
//!
//! counts.insert(guild_id.clone(), record);
//! let record = counts.get(&guild_id);
//! ```

mod config;
mod registry;
mod typed;

pub use config::CacheConfig;
pub use registry::CacheRegistry;
pub use typed::TypedCache;
