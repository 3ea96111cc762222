//! API response types

use serde::{Deserialize, Serialize};

use crate::actors::messages::IngestStats;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `saturated`
    pub status: String,
    pub queue_depth: usize,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub timestamp: String,
    pub ingest: IngestStats,
    /// Dedup keys of workloads currently alerted as down
    pub alerted: Vec<String>,
}

/// Query of `GET /monitor`
#[derive(Debug, Clone, Deserialize)]
pub struct RestartQuery {
    pub containerid: Option<String>,
}
