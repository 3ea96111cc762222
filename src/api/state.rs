//! API shared state

use std::sync::Arc;

use crate::actors::dedup::AlertDeduplicator;
use crate::actors::ingest::EventQueue;
use crate::runtime::ContainerRuntime;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Runtime used to restart containers
    pub runtime: Arc<dyn ContainerRuntime>,

    /// Producer handle of the event queue, for its counters
    pub queue: EventQueue,

    /// Deduplicator, for the currently alerted keys
    pub deduplicator: Arc<AlertDeduplicator>,
}

impl ApiState {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        queue: EventQueue,
        deduplicator: Arc<AlertDeduplicator>,
    ) -> Self {
        Self {
            runtime,
            queue,
            deduplicator,
        }
    }
}
