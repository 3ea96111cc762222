//! End-to-end tests of the poll → ingest → dedup → notify pipeline
//!
//! These tests verify that:
//! - Poll results reach the sink through the queue and worker
//! - A workload going down produces exactly one notification
//! - The notification carries the identity of the last running container
//! - A workload coming back re-arms alerting

use std::sync::Arc;
use std::time::Duration;

use docker_monitor::{
    UNKNOWN_MEASUREMENT, WorkloadKind,
    actors::{
        dedup::{AlertDeduplicator, Decision},
        ingest::{self, EventQueue},
        poller::Poller,
    },
    storage::{FieldValue, memory::MemorySink},
};
use pretty_assertions::assert_eq;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

struct Pipeline {
    runtime: Arc<FakeRuntime>,
    sink: Arc<MemorySink>,
    notifier: Arc<RecordingNotifier>,
    queue: EventQueue,
    deduplicator: AlertDeduplicator,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

impl Pipeline {
    async fn start() -> Self {
        let runtime = FakeRuntime::new();
        let sink = memory_sink().await;
        let notifier = RecordingNotifier::new();
        let (queue, worker) = ingest::channel(64, sink.clone(), DATABASE, Duration::from_secs(1));
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(worker.run(shutdown.clone()));
        let deduplicator = AlertDeduplicator::new(
            sink.clone(),
            notifier.clone(),
            DATABASE,
            Duration::from_secs(1),
        );

        Self {
            runtime,
            sink,
            notifier,
            queue,
            deduplicator,
            shutdown,
            worker,
        }
    }

    fn poller(&self, kind: WorkloadKind) -> Poller {
        Poller::new(
            kind,
            self.runtime.clone(),
            self.queue.clone(),
            Duration::from_secs(30),
        )
    }

    /// Poll once and wait until the worker wrote everything
    async fn poll(&self, kind: WorkloadKind) {
        let before = self.queue.stats().written;
        let offered = self.poller(kind).poll_once().await.unwrap() as u64;
        let queue = self.queue.clone();
        wait_until(|| {
            let queue = queue.clone();
            async move { queue.stats().written == before + offered }
        })
        .await;
        // keep sample timestamps of consecutive polls apart
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.worker.await.unwrap();
    }
}

#[tokio::test]
async fn test_running_container_is_recorded() {
    let pipeline = Pipeline::start().await;
    pipeline
        .runtime
        .set_running(vec![container("0123456789abcdef0123", "nginx:1.25")])
        .await;

    pipeline.poll(WorkloadKind::Nginx).await;

    let points = pipeline.sink.points(DATABASE, "NginxContainerEvents").await;
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].tags["ContainerName"], "nginx");
    assert_eq!(points[0].fields["ContainerID"], FieldValue::from("0123456789"));
    assert_eq!(points[0].fields["Status"], FieldValue::from("start"));

    pipeline.stop().await;
}

#[tokio::test]
async fn test_down_transition_alerts_once_with_last_identity() {
    let pipeline = Pipeline::start().await;
    pipeline
        .runtime
        .set_running(vec![container("abc123abc123abc123", "nginx:latest")])
        .await;
    pipeline.poll(WorkloadKind::Nginx).await;
    assert_eq!(
        pipeline.deduplicator.tick(WorkloadKind::Nginx).await.unwrap(),
        vec![Decision::Rearmed {
            key: "nginxstart".into(),
            cleared: false
        }]
    );

    pipeline.runtime.set_running(vec![]).await;
    pipeline.poll(WorkloadKind::Nginx).await;

    for _ in 0..3 {
        pipeline.deduplicator.tick(WorkloadKind::Nginx).await.unwrap();
    }

    assert_eq!(pipeline.notifier.ids().await, vec!["abc123abc1"]);
    let sent = pipeline.notifier.sent.lock().await;
    assert_eq!(sent[0].0.name, "nginx");
    assert_eq!(sent[0].0.image_name, "nginx:latest");
    drop(sent);
    assert!(pipeline.deduplicator.is_alerted(WorkloadKind::Nginx).await);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_recovery_rearms_and_next_outage_alerts_again() {
    let pipeline = Pipeline::start().await;

    pipeline
        .runtime
        .set_running(vec![container("aaaaaaaaaaaaaaaa", "httpd:2.4")])
        .await;
    pipeline.poll(WorkloadKind::Httpd).await;
    pipeline.runtime.set_running(vec![]).await;
    pipeline.poll(WorkloadKind::Httpd).await;
    pipeline.deduplicator.tick(WorkloadKind::Httpd).await.unwrap();

    pipeline
        .runtime
        .set_running(vec![container("bbbbbbbbbbbbbbbb", "httpd:2.4")])
        .await;
    pipeline.poll(WorkloadKind::Httpd).await;
    pipeline.deduplicator.tick(WorkloadKind::Httpd).await.unwrap();
    assert!(!pipeline.deduplicator.is_alerted(WorkloadKind::Httpd).await);

    pipeline.runtime.set_running(vec![]).await;
    pipeline.poll(WorkloadKind::Httpd).await;
    pipeline.deduplicator.tick(WorkloadKind::Httpd).await.unwrap();

    assert_eq!(
        pipeline.notifier.ids().await,
        vec!["aaaaaaaaaa", "bbbbbbbbbb"]
    );

    pipeline.stop().await;
}

#[tokio::test]
async fn test_down_without_history_sends_nothing() {
    let pipeline = Pipeline::start().await;
    pipeline.poll(WorkloadKind::Postgres).await;

    let decisions = pipeline
        .deduplicator
        .tick(WorkloadKind::Postgres)
        .await
        .unwrap();
    assert_eq!(
        decisions,
        vec![Decision::IdentityUnresolved {
            key: "postgresstop".into()
        }]
    );
    assert_eq!(pipeline.notifier.count().await, 0);
    assert!(pipeline.deduplicator.alerted_keys().await.is_empty());

    pipeline.stop().await;
}

#[tokio::test]
async fn test_unmatched_containers_are_recorded_as_unknown() {
    let pipeline = Pipeline::start().await;
    pipeline
        .runtime
        .set_running(vec![
            container("1111111111111111", "redis:7"),
            container("2222222222222222", "nginx:latest"),
        ])
        .await;

    let poller = pipeline.poller(WorkloadKind::Nginx).record_unmatched(true);
    assert_eq!(poller.poll_once().await.unwrap(), 2);

    let queue = pipeline.queue.clone();
    wait_until(|| {
        let queue = queue.clone();
        async move { queue.stats().written == 2 }
    })
    .await;

    let unknown = pipeline.sink.points(DATABASE, UNKNOWN_MEASUREMENT).await;
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].fields["ImageName"], FieldValue::from("redis:7"));
    assert_eq!(pipeline.sink.count(DATABASE, "NginxContainerEvents").await, 1);

    pipeline.stop().await;
}
