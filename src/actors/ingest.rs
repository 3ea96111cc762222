//! Bounded event queue and the ingestion worker draining it
//!
//! ## Message Flow
//!
//! ```text
//! Poller(s) → EventQueue::enqueue (non-blocking) → [bounded FIFO] → IngestionWorker → MetricSink::write
//! ```
//!
//! The queue never blocks its producers: a full queue drops the new event
//! and counts it. The worker owns the single receiving end, so exactly one
//! writer talks to the sink. A failed write is logged and the event is
//! discarded; nothing is retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use crate::storage::schema::point_for_event;
use crate::storage::{MetricSink, with_deadline};

use super::messages::{IngestStats, LifecycleEvent};

/// Default number of events the queue holds before dropping
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
}

/// Create a queue of `capacity` events and the worker that drains it into
/// `database` on `sink`.
pub fn channel(
    capacity: usize,
    sink: Arc<dyn MetricSink>,
    database: impl Into<String>,
    timeout: Duration,
) -> (EventQueue, IngestionWorker) {
    let capacity = capacity.max(1);
    let (sender, receiver) = mpsc::channel(capacity);
    let counters = Arc::new(Counters::default());

    let queue = EventQueue {
        sender,
        counters: counters.clone(),
    };
    let worker = IngestionWorker {
        receiver,
        sink,
        database: database.into(),
        timeout,
        counters,
    };

    (queue, worker)
}

/// Producer side of the event queue
///
/// Cheap to clone; every poller holds its own clone.
#[derive(Debug, Clone)]
pub struct EventQueue {
    sender: mpsc::Sender<LifecycleEvent>,
    counters: Arc<Counters>,
}

impl EventQueue {
    /// Offer an event to the queue without blocking.
    ///
    /// When the queue is full (or the worker is gone) the event is dropped
    /// and counted; queued events are never evicted.
    pub fn enqueue(&self, event: LifecycleEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                trace!("event enqueued ({} waiting)", self.len());
            }
            Err(TrySendError::Full(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "event queue full ({} events), dropping {} event for {:?}",
                    self.capacity(),
                    event.snapshot.lifecycle_status,
                    event.snapshot.name
                );
            }
            Err(TrySendError::Closed(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "ingestion worker stopped, dropping event for {:?}",
                    event.snapshot.name
                );
            }
        }
    }

    /// Events currently waiting
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            written: self.counters.written.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            capacity: self.capacity(),
            depth: self.len(),
        }
    }
}

/// Single consumer writing queued events to the sink
pub struct IngestionWorker {
    receiver: mpsc::Receiver<LifecycleEvent>,
    sink: Arc<dyn MetricSink>,
    database: String,
    timeout: Duration,
    counters: Arc<Counters>,
}

impl IngestionWorker {
    /// Run until `shutdown` fires or every producer is gone.
    ///
    /// A write already in progress completes before the stop is honoured.
    #[instrument(skip_all, fields(database = %self.database))]
    pub async fn run(mut self, shutdown: CancellationToken) {
        debug!("starting ingestion worker");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("received shutdown signal");
                    break;
                }

                next = self.receiver.recv() => {
                    match next {
                        Some(event) => self.process_event(event).await,
                        None => {
                            debug!("all producers dropped, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("ingestion worker stopped");
    }

    async fn process_event(&self, event: LifecycleEvent) {
        let point = point_for_event(&event, Utc::now());
        let measurement = point.measurement.clone();

        match with_deadline(self.timeout, self.sink.write(&self.database, vec![point])).await {
            Ok(()) => {
                self.counters.written.fetch_add(1, Ordering::Relaxed);
                trace!("wrote {} sample to {measurement}", event.snapshot.lifecycle_status);
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!("failed to write sample to {measurement}: {e}");
            }
        }
    }
}
