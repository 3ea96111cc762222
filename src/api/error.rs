//! Control endpoint errors

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::warn;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// `containerid` was absent or empty
    MissingContainerId,

    /// The runtime refused to start the container
    StartFailed { id: String, reason: String },
}

impl ApiError {
    pub fn start_failed(id: &str, err: anyhow::Error) -> Self {
        ApiError::StartFailed {
            id: id.to_string(),
            reason: format!("{err:#}"),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingContainerId => StatusCode::BAD_REQUEST,
            ApiError::StartFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MissingContainerId => write!(f, "missing containerid query parameter"),
            ApiError::StartFailed { id, reason } => {
                write!(f, "failed to start container {id}: {reason}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("{self}");
        let body = match &self {
            ApiError::MissingContainerId => json!({ "error": self.to_string() }),
            ApiError::StartFailed { id, .. } => json!({
                "error": self.to_string(),
                "containerid": id,
            }),
        };

        (self.status(), Json(body)).into_response()
    }
}
