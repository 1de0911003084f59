//! Operational HTTP API for health and metrics.

pub mod handlers;
pub mod routes;

pub use handlers::{AppState, TickSummary};
pub use routes::create_router;
