//! Integration tests for the control API
//!
//! These tests verify that:
//! - The restart endpoint starts containers through the runtime
//! - Missing parameters and runtime failures map to 400 / 500
//! - Health and stats report the expected JSON
//! - CORS headers are present

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use docker_monitor::{
    WorkloadKind,
    actors::{
        dedup::AlertDeduplicator,
        ingest::{self, EventQueue, IngestionWorker},
        messages::LifecycleEvent,
    },
    api::{ApiState, router, spawn_api_server},
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::helpers::*;

async fn state(runtime: Arc<FakeRuntime>) -> (ApiState, EventQueue, IngestionWorker) {
    let sink = memory_sink().await;
    let (queue, worker) = ingest::channel(8, sink.clone(), DATABASE, Duration::from_secs(1));
    let dedup = Arc::new(AlertDeduplicator::new(
        sink,
        RecordingNotifier::new(),
        DATABASE,
        Duration::from_secs(1),
    ));
    (ApiState::new(runtime, queue.clone(), dedup), queue, worker)
}

async fn get(state: ApiState, uri: &str) -> (StatusCode, String) {
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_restart_starts_container() {
    let runtime = FakeRuntime::new();
    let (state, _queue, _worker) = state(runtime.clone()).await;

    let (status, body) = get(state, "/monitor?containerid=abc123abc1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Successfully started container abc123abc1");
    assert_eq!(*runtime.started.lock().await, vec!["abc123abc1".to_string()]);
}

#[tokio::test]
async fn test_restart_without_id_is_bad_request() {
    let runtime = FakeRuntime::new();
    let (state, _queue, _worker) = state(runtime.clone()).await;

    let (status, body) = get(state.clone(), "/monitor").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("containerid"));

    let (status, _) = get(state, "/monitor?containerid=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(runtime.started.lock().await.is_empty());
}

#[tokio::test]
async fn test_restart_failure_is_server_error() {
    let runtime = FakeRuntime::new();
    runtime.set_failing(true);
    let (state, _queue, _worker) = state(runtime).await;

    let (status, body) = get(state, "/monitor?containerid=gone").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("no such container"));
    assert_eq!(json["containerid"], "gone");
}

#[tokio::test]
async fn test_health() {
    let (state, _queue, _worker) = state(FakeRuntime::new()).await;

    let (status, body) = get(state, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["queue_depth"], 0);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_reports_saturated_queue() {
    let (state, queue, _worker) = state(FakeRuntime::new()).await;

    for _ in 0..8 {
        queue.enqueue(LifecycleEvent::stopped(WorkloadKind::Httpd));
    }

    let (status, body) = get(state, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "saturated");
    assert_eq!(json["queue_depth"], 8);
}

#[tokio::test]
async fn test_stats_reports_queue_counters() {
    let runtime = FakeRuntime::new();
    let (state, queue, _worker) = state(runtime.clone()).await;

    for _ in 0..10 {
        queue.enqueue(LifecycleEvent::stopped(WorkloadKind::Nginx));
    }

    let (status, body) = get(state, "/stats").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["ingest"]["enqueued"], 8);
    assert_eq!(json["ingest"]["dropped"], 2);
    assert_eq!(json["ingest"]["capacity"], 8);
    assert_eq!(json["ingest"]["depth"], 8);
    assert_eq!(json["alerted"], Value::Array(vec![]));
}

#[tokio::test]
async fn test_cors_headers() {
    let (state, _queue, _worker) = state(FakeRuntime::new()).await;

    let response = router(state)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://dashboard.local")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_server_binds_and_shuts_down() {
    let (state, _queue, _worker) = state(FakeRuntime::new()).await;
    let shutdown = CancellationToken::new();

    let addr = spawn_api_server("127.0.0.1:0".parse().unwrap(), state, shutdown.clone())
        .await
        .unwrap();

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert!(response.status().is_success());

    shutdown.cancel();
}
