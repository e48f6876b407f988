//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let broadcaster = state.pipeline.broadcaster();

    Json(json!({
        "status": "healthy",
        "service": "tally-server",
        "version": env!("CARGO_PKG_VERSION"),
        "subscribers": state.subscriber_count(),
        "frames_delivered": broadcaster.frames_delivered(),
        "delivery_failures": broadcaster.delivery_failures(),
    }))
}
