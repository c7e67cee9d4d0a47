//! Guild member counts.
//!
//! ## Architecture
//!
//! - `model` - Update payloads and the derived per-guild counts
//! - `store` - Last known counts per guild (registry-backed cache)
//! - `provider` - Outbound member list requests
//! - `resolver` - Cache lookup, fetch and wait for the matching update

pub mod model;
pub mod provider;
pub mod resolver;
pub mod store;

pub use model::{CountsError, GuildId, MemberCounts, MemberListGroup, MemberListUpdate};
pub use provider::{FeedProvider, MemberListProvider};
pub use resolver::{CountResolver, ResolveError, ResolverConfig};
pub use store::MemberCountStore;
