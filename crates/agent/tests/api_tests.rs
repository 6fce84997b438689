//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use detector_lib::{
    health::{components, HealthRegistry},
    models::{CycleState, ModelStatus},
    observability::DetectorMetrics,
    Severity,
};
use sentinel_agent::api::{create_router, AppState};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>, watch::Sender<ModelStatus>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::ENSEMBLE).await;
    health_registry.register(components::METRICS_SOURCE).await;

    let metrics = DetectorMetrics::new();
    let (status_tx, status_rx) = watch::channel(ModelStatus::default());
    let state = Arc::new(AppState::new(health_registry, metrics, status_rx));
    let router = create_router(state.clone());

    (router, state, status_tx)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state, _tx) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state, _tx) = setup_test_app().await;

    state
        .health_registry
        .record_failure(components::METRICS_SOURCE, "collection timed out")
        .await;

    let (status, body) = get(app, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["metrics_source"]["consecutive_failures"],
        1
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state, _tx) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::ENSEMBLE, "bootstrap fit failed")
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state, _tx) = setup_test_app().await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state, _tx) = setup_test_app().await;
    state.health_registry.set_ready(true).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state, _tx) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::METRICS_SOURCE, "proc unreadable")
        .await;

    let (status, _) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state, _tx) = setup_test_app().await;

    state.metrics.observe_cycle_latency(0.02);
    state.metrics.inc_anomalies_detected("cpu", Severity::Critical);
    state.metrics.set_buffer_len("cpu", 10);
    state.metrics.set_models_active(4);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("sentinel_cycle_latency_seconds_bucket"));
    assert!(metrics_text.contains("sentinel_anomalies_detected_total"));
    assert!(metrics_text.contains("sentinel_buffer_len{metric=\"cpu\"}"));
    assert!(metrics_text.contains("sentinel_models_active"));
}

#[tokio::test]
async fn test_status_reflects_latest_snapshot() {
    let (app, _state, status_tx) = setup_test_app().await;

    let mut buffer_sizes = BTreeMap::new();
    buffer_sizes.insert("cpu".to_string(), 42);
    status_tx.send_replace(ModelStatus {
        buffer_sizes,
        state: CycleState::Detecting,
        total_anomalies_detected: 3,
        ..Default::default()
    });

    let (status, body) = get(app, "/status").await;
    assert_eq!(status, StatusCode::OK);

    let snapshot: ModelStatus = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot.buffer_sizes["cpu"], 42);
    assert_eq!(snapshot.state, CycleState::Detecting);
    assert_eq!(snapshot.total_anomalies_detected, 3);

    let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(raw["state"], "detecting");
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _state, _tx) = setup_test_app().await;

    let (status, _) = get(app, "/predict").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
