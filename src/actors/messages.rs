//! Message types passed between tasks
//!
//! Pollers produce [`LifecycleEvent`]s into the event queue; the ingestion
//! worker consumes each one exactly once. [`IngestStats`] is the read-only
//! view of the queue counters exposed over the control API.

use serde::{Deserialize, Serialize};

use crate::{WorkloadKind, WorkloadSnapshot};

/// One observation to be written to the sink.
///
/// `kind` is `None` for containers that matched no monitored kind; those are
/// written to the unknown measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub kind: Option<WorkloadKind>,
    pub snapshot: WorkloadSnapshot,
}

impl LifecycleEvent {
    pub fn new(kind: Option<WorkloadKind>, snapshot: WorkloadSnapshot) -> Self {
        Self { kind, snapshot }
    }

    /// Event recording that no container of `kind` is running
    pub fn stopped(kind: WorkloadKind) -> Self {
        Self {
            kind: Some(kind),
            snapshot: WorkloadSnapshot::stopped(kind),
        }
    }
}

/// Counters of the event queue and ingestion worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Events accepted into the queue
    pub enqueued: u64,

    /// Events rejected because the queue was full or closed
    pub dropped: u64,

    /// Events written to the sink
    pub written: u64,

    /// Events whose write failed or timed out
    pub failed: u64,

    pub capacity: usize,

    /// Events currently waiting in the queue
    pub depth: usize,
}
