//! Web API module for Agentable
//!
//! Provides REST API endpoints for:
//! - Starting runs
//! - Run history
//! - Health checks
//! - OpenAPI documentation

pub mod docs;
pub mod health;
pub mod history;
pub mod response;
pub mod runs;

use axum::Router;

pub use docs::docs_routes;
pub use health::health_routes;
pub use history::history_routes;
pub use response::{ApiError, ErrorBody};
pub use runs::runs_routes;

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new().merge(runs_routes()).merge(history_routes())
}
