//! Health check endpoint

use axum::{extract::State, Json};

use crate::dto::HealthResponse;
use crate::AppState;

/// GET /health - API liveness plus vault and clock status
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let started = state.engine().lock().await.vault().is_started();
    Json(HealthResponse::new(started, state.now()))
}
