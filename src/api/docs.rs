//! API Documentation - Swagger UI
//!
//! Provides OpenAPI documentation at /docs

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::{
    health::HealthResponse,
    history::{ClearedResponse, HistoryQuery, RunDetail, RunSummary},
    response::ErrorBody,
    runs::{RunRequest, RunResponse},
};

/// Agentable API OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Agentable API",
        version = "1.0.0",
        description = "Turn a prompt into a crew of agents and stream its progress.

## Overview
- **Runs**: `POST /api/run` starts a run and returns its id immediately
- **Events**: connect to `/api/ws/{runId}` for replayed and live events
  (`pipeline-init`, `agent-update`, `log`, `complete`, `error`)
- **History**: list, inspect and clear runs
",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Runs
        crate::api::runs::start_run,
        // History
        crate::api::history::list_runs,
        crate::api::history::get_run,
        crate::api::history::clear_history,
        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            ErrorBody,
            // Runs
            RunRequest,
            RunResponse,
            // History
            HistoryQuery,
            RunSummary,
            RunDetail,
            ClearedResponse,
            // Health
            HealthResponse,
        )
    ),
    tags(
        (name = "runs", description = "Run submission"),
        (name = "history", description = "Run history"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

/// Create documentation routes
pub fn docs_routes() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api/openapi.json", ApiDoc::openapi()))
}
