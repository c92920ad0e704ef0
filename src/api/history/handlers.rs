use agentable_core::{ExecutionDriver, RunId};
use axum::{
    extract::{rejection::QueryRejection, Path, Query},
    Extension, Json,
};
use std::sync::Arc;
use tracing::info;

use super::super::response::{ApiError, ErrorBody};
use super::types::{ClearedResponse, HistoryQuery, RunDetail, RunSummary};

/// List recent runs, newest first
#[utoipa::path(
    get,
    path = "/api/history",
    tag = "history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Recent runs", body = Vec<RunSummary>),
        (status = 400, description = "Unreadable query", body = ErrorBody)
    )
)]
pub async fn list_runs(
    Extension(driver): Extension<Arc<ExecutionDriver>>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<RunSummary>>, ApiError> {
    let Query(query) = query?;
    let runs = driver.registry().list(query.effective_limit());
    Ok(Json(runs.iter().map(RunSummary::from).collect()))
}

/// Get a single run
#[utoipa::path(
    get,
    path = "/api/history/{run_id}",
    tag = "history",
    params(
        ("run_id" = String, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "Run detail", body = RunDetail),
        (status = 404, description = "Run not found", body = ErrorBody)
    )
)]
pub async fn get_run(
    Extension(driver): Extension<Arc<ExecutionDriver>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunDetail>, ApiError> {
    let run = run_id
        .parse::<RunId>()
        .ok()
        .and_then(|id| driver.registry().get(&id))
        .ok_or_else(|| ApiError::not_found(format!("run not found: {}", run_id)))?;
    Ok(Json(RunDetail::from(run)))
}

/// Forget every run
#[utoipa::path(
    delete,
    path = "/api/history",
    tag = "history",
    responses(
        (status = 200, description = "History cleared", body = ClearedResponse)
    )
)]
pub async fn clear_history(
    Extension(driver): Extension<Arc<ExecutionDriver>>,
) -> Json<ClearedResponse> {
    let cleared = driver.registry().clear();
    info!(cleared, "Run history cleared");
    Json(ClearedResponse { cleared })
}
