//! App module - Wiring and run loop.

mod runtime;
pub mod state;

pub use runtime::run;
pub use state::AppState;
