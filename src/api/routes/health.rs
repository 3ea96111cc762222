//! Liveness endpoint

use axum::{Json, extract::State};

use crate::api::{state::ApiState, types::HealthResponse};

/// GET /health
///
/// Reports `saturated` while the event queue is full and new samples are
/// being dropped.
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let queue_depth = state.queue.len();
    let status = if queue_depth >= state.queue.capacity() {
        "saturated"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        queue_depth,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
