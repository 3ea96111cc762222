//! Helper types and functions for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docker_monitor::{
    WorkloadSnapshot,
    alerts::Notifier,
    runtime::{ContainerRuntime, ContainerSummary},
    storage::{
        MetricSink, Point, QueryResponse, SampleQuery, SinkError, SinkResult, memory::MemorySink,
    },
};
use tokio::sync::Mutex;

pub const DATABASE: &str = "containers";

/// Runtime whose container list is set by the test
#[derive(Default)]
pub struct FakeRuntime {
    pub containers: Mutex<Vec<ContainerSummary>>,
    pub started: Mutex<Vec<String>>,
    pub failing: AtomicBool,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set_running(&self, containers: Vec<ContainerSummary>) {
        *self.containers.lock().await = containers;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self) -> anyhow::Result<Vec<ContainerSummary>> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("cannot connect to the docker daemon");
        }
        Ok(self.containers.lock().await.clone())
    }

    async fn start_container(&self, id: &str) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("no such container: {id}");
        }
        self.started.lock().await.push(id.to_string());
        Ok(())
    }
}

/// Notifier remembering every call
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(WorkloadSnapshot, DateTime<Utc>)>>,
    pub failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn ids(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|(snapshot, _)| snapshot.id.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        snapshot: &WorkloadSnapshot,
        observed_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.sent.lock().await.push((snapshot.clone(), observed_at));
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("smtp relay refused connection");
        }
        Ok(())
    }
}

/// In-memory sink that can be switched into an outage
#[derive(Default)]
pub struct FlakySink {
    pub inner: MemorySink,
    pub down: AtomicBool,
}

impl FlakySink {
    pub async fn new() -> Arc<Self> {
        let sink = Self::default();
        sink.inner.create_database(DATABASE).await.unwrap();
        Arc::new(sink)
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> SinkResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(SinkError::ConnectionFailed("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MetricSink for FlakySink {
    async fn create_database(&self, name: &str) -> SinkResult<()> {
        self.check()?;
        self.inner.create_database(name).await
    }

    async fn write(&self, database: &str, points: Vec<Point>) -> SinkResult<()> {
        self.check()?;
        self.inner.write(database, points).await
    }

    async fn query(&self, database: &str, query: &SampleQuery) -> SinkResult<QueryResponse> {
        self.check()?;
        self.inner.query(database, query).await
    }

    async fn ping(&self) -> SinkResult<()> {
        self.check()
    }
}

pub async fn memory_sink() -> Arc<MemorySink> {
    let sink = Arc::new(MemorySink::new());
    sink.create_database(DATABASE).await.unwrap();
    sink
}

pub fn container(id: &str, image: &str) -> ContainerSummary {
    ContainerSummary {
        id: id.to_string(),
        image: image.to_string(),
        state: "running".to_string(),
        status: "Up 5 minutes".to_string(),
        created: Some(1_700_000_000),
        network_mode: "bridge".to_string(),
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until<F, Fut>(condition: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
