//! In-memory sink (no persistence)
//!
//! This sink keeps every written point in memory, grouped by database and
//! measurement. It's useful for:
//! - Testing without an InfluxDB instance
//! - Running the monitor without a time-series store (`backend: none`)
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Unbounded**: Points are never evicted

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::backend::{MetricSink, Point, SampleQuery};
use super::error::{SinkError, SinkResult};
use super::schema::{COLUMNS, QueryResponse, Series, row_for_point};

/// In-memory sink
#[derive(Default)]
pub struct MemorySink {
    databases: RwLock<HashSet<String>>,

    /// Points per (database, measurement), in write order
    points: RwLock<HashMap<(String, String), Vec<Point>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points stored in `measurement` of `database`
    pub async fn count(&self, database: &str, measurement: &str) -> usize {
        self.points
            .read()
            .await
            .get(&(database.to_string(), measurement.to_string()))
            .map_or(0, Vec::len)
    }

    /// Copy of the points stored in `measurement` of `database`, in write order
    pub async fn points(&self, database: &str, measurement: &str) -> Vec<Point> {
        self.points
            .read()
            .await
            .get(&(database.to_string(), measurement.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MetricSink for MemorySink {
    async fn create_database(&self, name: &str) -> SinkResult<()> {
        debug!("creating in-memory database {name}");
        self.databases.write().await.insert(name.to_string());
        Ok(())
    }

    async fn write(&self, database: &str, points: Vec<Point>) -> SinkResult<()> {
        if !self.databases.read().await.contains(database) {
            return Err(SinkError::WriteFailed(format!(
                "database not found: {database}"
            )));
        }

        let mut stored = self.points.write().await;
        for point in points {
            trace!("storing point in {}", point.measurement);
            let series = stored
                .entry((database.to_string(), point.measurement.clone()))
                .or_default();

            // same tag set and timestamp is the same point: fields merge into it
            match series
                .iter_mut()
                .find(|p| p.timestamp == point.timestamp && p.tags == point.tags)
            {
                Some(existing) => existing.fields.extend(point.fields),
                None => series.push(point),
            }
        }

        Ok(())
    }

    async fn query(&self, database: &str, query: &SampleQuery) -> SinkResult<QueryResponse> {
        if !self.databases.read().await.contains(database) {
            return Err(SinkError::QueryFailed(format!(
                "database not found: {database}"
            )));
        }

        let stored = self.points.read().await;
        let Some(points) = stored.get(&(database.to_string(), query.measurement().to_string()))
        else {
            return Ok(QueryResponse::default());
        };

        let selected: Vec<&Point> = match query {
            // Every point sharing the newest timestamp, like a tie in the store
            SampleQuery::Latest(_) => match points.iter().map(|p| p.timestamp).max() {
                Some(newest) => points.iter().filter(|p| p.timestamp == newest).collect(),
                None => vec![],
            },
            SampleQuery::All(_) => {
                let mut all: Vec<&Point> = points.iter().collect();
                all.sort_by_key(|p| p.timestamp);
                all
            }
        };

        if selected.is_empty() {
            return Ok(QueryResponse::default());
        }

        Ok(QueryResponse {
            series: vec![Series {
                name: query.measurement().to_string(),
                columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
                values: selected.into_iter().map(row_for_point).collect(),
            }],
        })
    }

    async fn ping(&self) -> SinkResult<()> {
        Ok(())
    }
}
