//! Event handling.
//!
//! - `dispatcher` - Listener registry and the await-next-matching primitive
//! - `ingestion` - Always-on listener feeding the member count store

pub mod dispatcher;
pub mod ingestion;

pub use dispatcher::{Dispatcher, GatewayEvent};
pub use ingestion::IngestionHandle;
