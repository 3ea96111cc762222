//! Time-series sinks for lifecycle samples
//!
//! This module provides a trait-based abstraction over the store the
//! ingestion worker appends samples to and the deduplicators read from.
//!
//! ## Design
//!
//! - **Trait-based**: `MetricSink` allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio tasks
//! - **Canonical rows**: Adapters reorder query results into [`schema::COLUMNS`]
//!
//! ## Backends
//!
//! - **InfluxDB** (default): 1.x HTTP API
//! - **In-Memory**: No persistence, for testing or running without a store
//!
//! ## Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use docker_monitor::storage::{MetricSink, influx::InfluxSink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sink = InfluxSink::new("http://influxdb:8086", None, None, true, Duration::from_secs(60))?;
//!     sink.create_database("containers").await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod influx;
pub mod memory;
pub mod schema;

pub use backend::{FieldValue, MetricSink, Point, SampleQuery};
pub use error::{SinkError, SinkResult, with_deadline};
pub use schema::{QueryResponse, SampleRow, Series};
