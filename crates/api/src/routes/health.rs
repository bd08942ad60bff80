//! Health check endpoint.

use axum::{extract::State, Json};

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_depth = state.queue.len().await.unwrap_or(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        queue_depth,
    })
}
