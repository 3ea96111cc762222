//! AlertDeduplicator - one notification per down episode
//!
//! ## State Machine
//!
//! The deduplicator keeps a set of keys `<container name><status>`. A key is
//! only ever inserted for Stop observations:
//!
//! ```text
//! latest = Stop,  "<name>stop" absent  → resolve last Start, notify, insert "<name>stop"
//! latest = Stop,  "<name>stop" present → nothing (already alerted)
//! latest = Start                       → remove "<name>stop" (re-arm)
//! ```
//!
//! The key is inserted even when the notification fails, so a failing
//! channel does not turn into an alert storm. When no prior Start sample
//! exists the key stays unset and the next tick tries again.
//!
//! One deduplicator is shared by the per-kind loops. Ticks of the same kind
//! run one at a time; the shared set is only locked to read it and to commit
//! a tick's changes, so a slow notification never holds up other kinds or
//! readers of the set. Each notification runs under its own deadline.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::alerts::Notifier;
use crate::storage::{MetricSink, SampleQuery, SampleRow, SinkResult, with_deadline};
use crate::{LifecycleStatus, WorkloadKind, WorkloadSnapshot};

/// Key under which an alerted down transition is remembered
pub fn dedup_key(container_name: &str, status: LifecycleStatus) -> String {
    format!("{container_name}{status}")
}

/// What a tick did with one sample row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The Stop was already alerted
    AlreadyHandled { key: String },

    /// A notification was sent for the resolved container
    Alerted { key: String, container_id: String },

    /// Sending failed; the key was set anyway
    NotifyFailed { key: String, container_id: String },

    /// No prior Start sample with an id; retried next tick
    IdentityUnresolved { key: String },

    /// A Start was seen; `cleared` tells whether a Stop key was removed
    Rearmed { key: String, cleared: bool },
}

pub struct AlertDeduplicator {
    sink: Arc<dyn MetricSink>,
    notifier: Arc<dyn Notifier>,
    database: String,
    timeout: Duration,
    notify_timeout: Duration,

    /// Serializes the ticks of one kind
    ticks: HashMap<WorkloadKind, Mutex<()>>,
    alerted: Mutex<HashSet<String>>,
}

impl AlertDeduplicator {
    /// `timeout` bounds every sink call and, unless overridden with
    /// [`notify_timeout`](Self::notify_timeout), every notification.
    pub fn new(
        sink: Arc<dyn MetricSink>,
        notifier: Arc<dyn Notifier>,
        database: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            sink,
            notifier,
            database: database.into(),
            timeout,
            notify_timeout: timeout,
            ticks: WorkloadKind::ALL
                .iter()
                .map(|kind| (*kind, Mutex::new(())))
                .collect(),
            alerted: Mutex::new(HashSet::new()),
        }
    }

    /// Deadline for one notification; an expired send counts as failed.
    pub fn notify_timeout(mut self, notify_timeout: Duration) -> Self {
        self.notify_timeout = notify_timeout;
        self
    }

    /// Evaluate the latest sample of `kind` and notify on a new down transition.
    ///
    /// A sink failure is returned as an error and leaves the alerted set as it
    /// was before the tick.
    #[instrument(skip(self), fields(measurement = kind.measurement()))]
    pub async fn tick(&self, kind: WorkloadKind) -> SinkResult<Vec<Decision>> {
        let measurement = kind.measurement();
        let _tick = self.ticks[&kind].lock().await;

        let latest = with_deadline(
            self.timeout,
            self.sink
                .query(&self.database, &SampleQuery::Latest(measurement.to_string())),
        )
        .await?;

        let Some(series) = latest.first_series() else {
            trace!("no samples yet");
            return Ok(vec![]);
        };
        if series.name != measurement {
            warn!("ignoring series {:?} returned for {measurement}", series.name);
            return Ok(vec![]);
        }

        let mut next = self.alerted.lock().await.clone();
        // (key, inserted) in the order they happened, committed at the end
        let mut changes = Vec::new();
        let mut decisions = Vec::new();

        for row in latest_per_container(series.rows()) {
            let name = &row.snapshot.name;
            let key = dedup_key(name, row.snapshot.lifecycle_status);

            if next.contains(&key) {
                trace!("{key} already alerted");
                decisions.push(Decision::AlreadyHandled { key });
                continue;
            }

            match row.snapshot.lifecycle_status {
                LifecycleStatus::Stop => {
                    let Some(last_running) = self.last_running(measurement).await? else {
                        error!("{name} is down but no earlier running sample has an id");
                        decisions.push(Decision::IdentityUnresolved { key });
                        continue;
                    };

                    info!("{name} container stopped, sending notification");
                    let container_id = last_running.id.clone();
                    match self.notify(&last_running, row.time).await {
                        Ok(()) => decisions.push(Decision::Alerted {
                            key: key.clone(),
                            container_id,
                        }),
                        Err(e) => {
                            error!("failed to send notification for {name}: {e:#}");
                            decisions.push(Decision::NotifyFailed {
                                key: key.clone(),
                                container_id,
                            });
                        }
                    }
                    next.insert(key.clone());
                    changes.push((key, true));
                }
                LifecycleStatus::Start => {
                    let stop_key = dedup_key(name, LifecycleStatus::Stop);
                    let cleared = next.remove(&stop_key);
                    if cleared {
                        debug!("{name} is back up, re-armed");
                        changes.push((stop_key, false));
                    }
                    decisions.push(Decision::Rearmed { key, cleared });
                }
            }
        }

        let mut alerted = self.alerted.lock().await;
        for (key, inserted) in changes {
            if inserted {
                alerted.insert(key);
            } else {
                alerted.remove(&key);
            }
        }

        Ok(decisions)
    }

    async fn notify(
        &self,
        snapshot: &WorkloadSnapshot,
        observed_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        match timeout(self.notify_timeout, self.notifier.send(snapshot, observed_at)).await {
            Ok(sent) => sent,
            Err(_) => anyhow::bail!("notification timed out after {:?}", self.notify_timeout),
        }
    }

    /// Most recent Start sample of `measurement` carrying a container id
    async fn last_running(&self, measurement: &str) -> SinkResult<Option<WorkloadSnapshot>> {
        let all = with_deadline(
            self.timeout,
            self.sink
                .query(&self.database, &SampleQuery::All(measurement.to_string())),
        )
        .await?;

        let Some(series) = all.first_series() else {
            return Ok(None);
        };

        Ok(series
            .rows()
            .into_iter()
            .filter(|row| {
                row.snapshot.lifecycle_status == LifecycleStatus::Start
                    && !row.snapshot.id.is_empty()
            })
            .max_by_key(|row| row.time)
            .map(|row: SampleRow| row.snapshot))
    }

    /// Whether a down transition of `kind` is currently alerted
    pub async fn is_alerted(&self, kind: WorkloadKind) -> bool {
        self.alerted
            .lock()
            .await
            .contains(&dedup_key(kind.name(), LifecycleStatus::Stop))
    }

    /// Sorted copy of the currently alerted keys
    pub async fn alerted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.alerted.lock().await.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Tick `kind` every `every` until `shutdown` fires.
    #[instrument(skip(self, shutdown))]
    pub async fn run(
        self: Arc<Self>,
        kind: WorkloadKind,
        every: Duration,
        shutdown: CancellationToken,
    ) {
        debug!("starting deduplicator loop");

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("received shutdown signal");
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.tick(kind).await {
                        error!("failed to query container events: {e}");
                    }
                }
            }
        }

        debug!("deduplicator loop stopped");
    }
}

/// Reduce a batch of tied latest rows to one row per container name.
///
/// A Start wins over a Stop at the same instant, so a batch evaluates the
/// same way whatever order the sink returned it in.
fn latest_per_container(rows: Vec<SampleRow>) -> Vec<SampleRow> {
    let mut by_name: BTreeMap<String, SampleRow> = BTreeMap::new();
    for row in rows {
        match by_name.entry(row.snapshot.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                if precedence(&row) > precedence(slot.get()) {
                    slot.insert(row);
                }
            }
        }
    }
    by_name.into_values().collect()
}

fn precedence(row: &SampleRow) -> (bool, DateTime<Utc>) {
    (row.snapshot.lifecycle_status == LifecycleStatus::Start, row.time)
}
