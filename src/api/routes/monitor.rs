//! Container restart endpoint
//!
//! Target of the link embedded in every down notification.

use axum::extract::{Query, State};
use tracing::{info, instrument};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::RestartQuery,
};

/// GET /monitor?containerid=<id>
#[instrument(skip(state))]
pub async fn restart_container(
    State(state): State<ApiState>,
    Query(query): Query<RestartQuery>,
) -> ApiResult<String> {
    let Some(id) = query.containerid.filter(|id| !id.is_empty()) else {
        return Err(ApiError::MissingContainerId);
    };

    info!("restart requested for container {id}");
    state
        .runtime
        .start_container(&id)
        .await
        .map_err(|e| ApiError::start_failed(&id, e))?;

    Ok(format!("Successfully started container {id}"))
}
