//! Concurrency tests
//!
//! These tests verify:
//! - The queue bound holds under concurrent producers
//! - Per-producer FIFO order reaches the sink
//! - Concurrent ticks on a shared deduplicator alert at most once

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use docker_monitor::{
    LifecycleStatus, WorkloadKind, WorkloadSnapshot,
    actors::{dedup::AlertDeduplicator, ingest, messages::LifecycleEvent},
    storage::FieldValue,
};
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

fn event(kind: WorkloadKind, id: String) -> LifecycleEvent {
    LifecycleEvent::new(
        Some(kind),
        WorkloadSnapshot {
            name: kind.name().to_string(),
            id,
            image_name: format!("{kind}:latest"),
            created_at: None,
            network: String::new(),
            runtime_state: "running".to_string(),
            runtime_status_text: String::new(),
            lifecycle_status: LifecycleStatus::Start,
        },
    )
}

#[tokio::test]
async fn test_600_events_into_500_slots_deliver_500() {
    let sink = memory_sink().await;
    let (queue, worker) = ingest::channel(500, sink.clone(), DATABASE, Duration::from_secs(1));

    for i in 0..600 {
        queue.enqueue(event(WorkloadKind::Nginx, format!("c{i}")));
    }
    let stats = queue.stats();
    assert_eq!(stats.enqueued, 500);
    assert_eq!(stats.dropped, 100);
    assert_eq!(stats.depth, 500);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(worker.run(shutdown.clone()));
    let q = queue.clone();
    wait_until(|| {
        let q = q.clone();
        async move { q.stats().written == 500 }
    })
    .await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(sink.count(DATABASE, "NginxContainerEvents").await, 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_keep_their_order() {
    let sink = memory_sink().await;
    let (queue, worker) = ingest::channel(64, sink.clone(), DATABASE, Duration::from_secs(1));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(worker.run(shutdown.clone()));

    let mut producers = vec![];
    for kind in WorkloadKind::ALL {
        let queue = queue.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..200 {
                queue.enqueue(event(kind, format!("{kind}-{i:03}")));
                if i % 16 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let q = queue.clone();
    wait_until(|| {
        let q = q.clone();
        async move {
            let stats = q.stats();
            stats.depth == 0 && stats.written == stats.enqueued
        }
    })
    .await;
    shutdown.cancel();
    handle.await.unwrap();

    let stats = queue.stats();
    assert_eq!(stats.enqueued + stats.dropped, 600);

    let mut written = HashMap::new();
    for kind in WorkloadKind::ALL {
        let ids: Vec<String> = sink
            .points(DATABASE, kind.measurement())
            .await
            .into_iter()
            .map(|p| match &p.fields["ContainerID"] {
                FieldValue::String(id) => id.clone(),
                other => panic!("unexpected id {other:?}"),
            })
            .collect();

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted, "{kind} samples out of order");
        written.insert(kind, ids.len() as u64);
    }
    assert_eq!(written.values().sum::<u64>(), stats.written);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ticks_alert_once() {
    let sink = memory_sink().await;
    let notifier = RecordingNotifier::new();
    let (queue, worker) = ingest::channel(16, sink.clone(), DATABASE, Duration::from_secs(1));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(worker.run(shutdown.clone()));

    for kind in WorkloadKind::ALL {
        queue.enqueue(event(kind, format!("{kind}-1")));
    }
    tokio::time::sleep(Duration::from_millis(2)).await;
    for kind in WorkloadKind::ALL {
        queue.enqueue(LifecycleEvent::stopped(kind));
    }
    let q = queue.clone();
    wait_until(|| {
        let q = q.clone();
        async move { q.stats().written == 6 }
    })
    .await;

    let dedup = Arc::new(AlertDeduplicator::new(
        sink.clone(),
        notifier.clone(),
        DATABASE,
        Duration::from_secs(1),
    ));

    let mut ticks = vec![];
    for _ in 0..8 {
        for kind in WorkloadKind::ALL {
            let dedup = dedup.clone();
            ticks.push(tokio::spawn(async move { dedup.tick(kind).await }));
        }
    }
    for tick in ticks {
        tick.await.unwrap().unwrap();
    }

    assert_eq!(notifier.count().await, 3);
    assert_eq!(
        dedup.alerted_keys().await,
        vec!["httpdstop", "nginxstop", "postgresstop"]
    );

    shutdown.cancel();
    handle.await.unwrap();
}
