//! Error types for sink operations

use std::fmt;
use std::time::Duration;

/// Result type alias for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors that can occur while talking to the time-series sink
#[derive(Debug)]
pub enum SinkError {
    /// Sink could not be reached (connect, ping)
    ConnectionFailed(String),

    /// Read query failed or the sink reported a query error
    QueryFailed(String),

    /// Point write was rejected or failed in transit
    WriteFailed(String),

    /// The response could not be decoded
    InvalidResponse(String),

    /// Invalid configuration
    InvalidConfig(String),

    /// The call did not finish within its deadline
    Timeout(Duration),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::ConnectionFailed(msg) => write!(f, "failed to connect to sink: {}", msg),
            SinkError::QueryFailed(msg) => write!(f, "sink query failed: {}", msg),
            SinkError::WriteFailed(msg) => write!(f, "sink write failed: {}", msg),
            SinkError::InvalidResponse(msg) => write!(f, "invalid sink response: {}", msg),
            SinkError::InvalidConfig(msg) => write!(f, "invalid sink configuration: {}", msg),
            SinkError::Timeout(after) => write!(f, "sink call timed out after {:?}", after),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            SinkError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            SinkError::InvalidResponse(err.to_string())
        } else {
            SinkError::QueryFailed(err.to_string())
        }
    }
}

/// Run a sink call under a deadline, mapping expiry to [`SinkError::Timeout`].
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> SinkResult<T>
where
    F: std::future::Future<Output = SinkResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(SinkError::Timeout(deadline)),
    }
}
