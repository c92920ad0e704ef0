//! Run submission endpoint

use agentable_core::{ExecutionDriver, RunId};
use axum::{extract::rejection::JsonRejection, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::response::{ApiError, ErrorBody};

/// Body of `POST /api/run`
#[derive(Debug, Deserialize, ToSchema)]
pub struct RunRequest {
    /// Natural-language request to plan and execute
    pub prompt: String,
}

/// Identifier of the started run
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    #[schema(value_type = String, format = Uuid)]
    pub run_id: RunId,
}

/// Start a run in the background
#[utoipa::path(
    post,
    path = "/api/run",
    tag = "runs",
    request_body = RunRequest,
    responses(
        (status = 200, description = "Run started", body = RunResponse),
        (status = 400, description = "Blank prompt", body = ErrorBody),
        (status = 422, description = "Body does not match the schema", body = ErrorBody),
        (status = 503, description = "Server is shutting down", body = ErrorBody)
    )
)]
pub async fn start_run(
    Extension(driver): Extension<Arc<ExecutionDriver>>,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ApiError> {
    let Json(request) = body?;
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt must not be empty"));
    }

    let run_id = driver.submit(request.prompt)?;
    info!(run_id = %run_id, "Run accepted");
    Ok(Json(RunResponse { run_id }))
}

/// Create run routes
pub fn runs_routes() -> Router {
    Router::new().route("/api/run", post(start_run))
}
