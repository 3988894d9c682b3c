//! HTTP API module for health, readiness, and status endpoints.

pub mod handlers;
pub mod routes;

pub use handlers::{AppState, BotStats};
pub use routes::create_router;
