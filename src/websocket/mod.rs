//! WebSocket module for Agentable
//!
//! Provides the per-run event stream at `/api/ws/{runId}`.

pub mod runs;

pub use runs::run_events_handler;

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new().route("/api/ws/:run_id", get(run_events_handler))
}
