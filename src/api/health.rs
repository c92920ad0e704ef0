//! Health check endpoints
//!
//! Provides:
//! - `/health`: "healthy" + version + active backend (for load balancers)
//! - `/`: service banner

use agentable_core::ExecutionDriver;
use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Simple health response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// `local` or `remote`
    pub backend: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn health_check(
    Extension(driver): Extension<Arc<ExecutionDriver>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: driver.backend().kind().to_string(),
    })
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Agentable Backend API".to_string(),
    })
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}
