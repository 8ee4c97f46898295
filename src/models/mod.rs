//! Data shapes shared across the tick pipeline.

pub mod lenient;
pub mod response;
pub mod state;

pub use response::AgentResponse;
pub use state::{ActionEntry, Position, TickState, HISTORY_LIMIT};
