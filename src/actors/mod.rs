//! Long-running tasks of the monitor
//!
//! Each task runs as an independent async task; they share nothing but the
//! event queue and the deduplicator.
//!
//! ## Architecture Overview
//!
//! ```text
//!   Poller(nginx)   Poller(httpd)   Poller(postgres)
//!        │               │               │
//!        └───────────────┼───────────────┘
//!                        │ enqueue (drop when full)
//!                ┌───────▼────────┐
//!                │   EventQueue   │ (bounded, FIFO)
//!                └───────┬────────┘
//!                        │
//!                ┌───────▼────────┐
//!                │IngestionWorker │──── write ───▶ MetricSink
//!                └────────────────┘                   │
//!                                                     │ query
//!                               ┌─────────────────────▼──┐
//!                               │   AlertDeduplicator    │ (one tick loop per kind)
//!                               └───────────┬────────────┘
//!                                           │ send
//!                                       Notifier
//! ```
//!
//! ## Task Types
//!
//! - **Poller**: Lists running containers and produces lifecycle events
//! - **IngestionWorker**: Single writer draining the queue into the sink
//! - **AlertDeduplicator**: Turns Stop samples into at most one notification per episode
//!
//! Every loop stops when the process-wide `CancellationToken` fires.

pub mod dedup;
pub mod ingest;
pub mod messages;
pub mod poller;
