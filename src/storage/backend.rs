//! Metric sink trait definition
//!
//! This module defines the `MetricSink` trait that every time-series
//! store implementation must implement, together with the point type
//! written into it and the read queries the alerting side issues.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SinkResult;
use super::schema::QueryResponse;

/// A scalar field value on a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// A single tagged sample to append to a measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

/// The two read queries issued against a measurement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleQuery {
    /// Most recent sample of the measurement
    Latest(String),

    /// Every sample of the measurement, oldest first
    All(String),
}

impl SampleQuery {
    pub fn measurement(&self) -> &str {
        match self {
            SampleQuery::Latest(m) | SampleQuery::All(m) => m,
        }
    }

    /// InfluxQL rendering of the query
    pub fn statement(&self) -> String {
        match self {
            SampleQuery::Latest(m) => format!("SELECT * FROM \"{m}\" ORDER BY time DESC LIMIT 1"),
            SampleQuery::All(m) => format!("SELECT * FROM \"{m}\""),
        }
    }
}

/// Trait for time-series sinks
///
/// The sink is append-only. Writes are expected to come from a single
/// writer (the ingestion worker); reads may happen concurrently.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across tasks.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Create the database if it does not exist.
    ///
    /// Must be idempotent: an already existing database is not an error.
    async fn create_database(&self, name: &str) -> SinkResult<()>;

    /// Append a batch of points to `database`.
    async fn write(&self, database: &str, points: Vec<Point>) -> SinkResult<()>;

    /// Run a read query against `database`.
    ///
    /// Every returned series uses the canonical column order defined in
    /// [`super::schema::COLUMNS`].
    async fn query(&self, database: &str, query: &SampleQuery) -> SinkResult<QueryResponse>;

    /// Lightweight reachability check
    async fn ping(&self) -> SinkResult<()>;
}
