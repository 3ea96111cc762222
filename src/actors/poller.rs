//! Poller - turns container listings into lifecycle events
//!
//! One poller runs per monitored kind. Every tick it lists the running
//! containers and enqueues a Start event per matching container, or a
//! single Stop event when nothing matched.
//!
//! ```text
//! Timer tick → list containers → match image → EventQueue::enqueue
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace};

use crate::runtime::{ContainerRuntime, ContainerSummary};
use crate::util::short_id;
use crate::{LifecycleStatus, WorkloadKind, WorkloadSnapshot};

use super::ingest::EventQueue;
use super::messages::LifecycleEvent;

pub struct Poller {
    kind: WorkloadKind,
    runtime: Arc<dyn ContainerRuntime>,
    queue: EventQueue,
    interval: Duration,

    /// Also enqueue containers matching no kind (written as unknown)
    record_unmatched: bool,
}

impl Poller {
    pub fn new(
        kind: WorkloadKind,
        runtime: Arc<dyn ContainerRuntime>,
        queue: EventQueue,
        interval: Duration,
    ) -> Self {
        Self {
            kind,
            runtime,
            queue,
            interval,
            record_unmatched: false,
        }
    }

    /// Enable recording of containers matching no kind.
    ///
    /// Only one poller per process should have this set, otherwise unmatched
    /// containers are recorded once per poller.
    pub fn record_unmatched(mut self, enabled: bool) -> Self {
        self.record_unmatched = enabled;
        self
    }

    /// Run one listing and enqueue its events; returns how many were offered.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn poll_once(&self) -> Result<usize> {
        let containers = self.runtime.list_containers().await?;

        let mut offered = 0;
        let mut matched = 0;
        for container in &containers {
            if self.kind.matches(&container.image) {
                matched += 1;
                offered += 1;
                let observed = snapshot(self.kind.name(), container);
                self.queue
                    .enqueue(LifecycleEvent::new(Some(self.kind), observed));
            } else if self.record_unmatched && unmatched(container) {
                offered += 1;
                self.queue
                    .enqueue(LifecycleEvent::new(None, snapshot("", container)));
            }
        }

        if matched == 0 {
            trace!("no running {} container", self.kind);
            offered += 1;
            self.queue.enqueue(LifecycleEvent::stopped(self.kind));
        } else {
            trace!("{matched} running {} containers", self.kind);
        }

        Ok(offered)
    }

    /// Poll every `interval` until `shutdown` fires.
    #[instrument(skip_all, fields(kind = %self.kind))]
    pub async fn run(self, shutdown: CancellationToken) {
        debug!("starting poller");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("received shutdown signal");
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!("failed to poll containers: {e:#}");
                    }
                }
            }
        }

        debug!("poller stopped");
    }
}

fn unmatched(container: &ContainerSummary) -> bool {
    !WorkloadKind::ALL
        .iter()
        .any(|kind| kind.matches(&container.image))
}

fn snapshot(name: &str, container: &ContainerSummary) -> WorkloadSnapshot {
    WorkloadSnapshot {
        name: name.to_string(),
        id: short_id(&container.id),
        image_name: container.image.clone(),
        created_at: container.created,
        network: container.network_mode.clone(),
        runtime_state: container.state.clone(),
        runtime_status_text: container.status.clone(),
        lifecycle_status: LifecycleStatus::Start,
    }
}
