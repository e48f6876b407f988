//! Ingestion and history endpoints.
//!
//! Each path is also served with a trailing slash for older clients.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tally_core::{EventKind, StoredEvent};

use crate::error::AppError;
use crate::state::AppState;

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/test-results", get(list_test_results).post(create_test_result))
        .route("/test-results/", get(list_test_results).post(create_test_result))
        .route("/usage-logs", get(list_usage_logs).post(create_usage_log))
        .route("/usage-logs/", get(list_usage_logs).post(create_usage_log))
}

/// Acknowledgement for an accepted submission.
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub message: &'static str,
    /// The committed record, including its assigned id.
    pub data: StoredEvent,
}

async fn create_test_result(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CreatedResponse>, AppError> {
    let Json(body) = body?;
    let stored = state.submit(EventKind::TestResult, body).await?;
    Ok(Json(CreatedResponse {
        message: "Test result added successfully",
        data: stored,
    }))
}

async fn list_test_results(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredEvent>>, AppError> {
    Ok(Json(state.list(EventKind::TestResult).await?))
}

async fn create_usage_log(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CreatedResponse>, AppError> {
    let Json(body) = body?;
    let stored = state.submit(EventKind::UsageLog, body).await?;
    Ok(Json(CreatedResponse {
        message: "Usage log added successfully",
        data: stored,
    }))
}

async fn list_usage_logs(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredEvent>>, AppError> {
    Ok(Json(state.list(EventKind::UsageLog).await?))
}
