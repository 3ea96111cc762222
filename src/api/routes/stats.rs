//! Ingestion and alert statistics endpoint

use axum::{Json, extract::State};

use crate::api::{state::ApiState, types::StatsResponse};

/// GET /stats
///
/// Returns the event queue counters and the currently alerted workloads
pub async fn get_stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        timestamp: chrono::Utc::now().to_rfc3339(),
        ingest: state.queue.stats(),
        alerted: state.deduplicator.alerted_keys().await,
    })
}
