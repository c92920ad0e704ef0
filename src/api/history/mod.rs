//! Run history API endpoints

use axum::{routing::get, Router};

mod handlers;
mod types;

#[cfg(test)]
mod tests;

pub use handlers::*;
pub use types::*;

/// Create history routes
pub fn history_routes() -> Router {
    Router::new()
        .route("/api/history", get(list_runs).delete(clear_history))
        .route("/api/history/:run_id", get(get_run))
}
