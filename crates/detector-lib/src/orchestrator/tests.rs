//! Tests for the detection orchestrator
//!
//! Collaborators are in-memory mocks; models are fitted on the seeded
//! synthetic bootstrap so every run is deterministic.

use super::*;
use crate::collector::SyntheticBootstrap;
use crate::health::ComponentStatus;
use crate::models::{BootstrapData, ModelActivity};
use async_trait::async_trait;
use chrono::{Duration as TimeDelta, TimeZone};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{broadcast, Notify};

/// Source returning a fixed batch, optionally failing
struct MockSource {
    batch: MetricBatch,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockSource {
    fn new(batch: MetricBatch) -> Arc<Self> {
        Arc::new(Self {
            batch,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MetricsSource for MockSource {
    async fn collect_all_metrics(&self) -> anyhow::Result<MetricBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("metrics backend unreachable");
        }
        Ok(self.batch.clone())
    }
}

/// Source that parks inside collection until released
struct GatedSource {
    batch: MetricBatch,
    entered: Arc<Notify>,
    release: Arc<Notify>,
    calls: AtomicUsize,
}

#[async_trait]
impl MetricsSource for GatedSource {
    async fn collect_all_metrics(&self) -> anyhow::Result<MetricBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.batch.clone())
    }
}

#[derive(Default)]
struct RecordingSink {
    alerts: Mutex<Vec<AnomalyResult>>,
    incidents: Mutex<Vec<AnomalyResult>>,
    fail: bool,
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send_alert(&self, anomaly: &AnomalyResult) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("alertmanager returned 503");
        }
        self.alerts.lock().unwrap().push(anomaly.clone());
        Ok(())
    }
}

#[async_trait]
impl IncidentSink for RecordingSink {
    async fn create_incident(&self, anomaly: &AnomalyResult) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("ticketing unavailable");
        }
        self.incidents.lock().unwrap().push(anomaly.clone());
        Ok(())
    }
}

struct FailingBootstrap;

#[async_trait]
impl BootstrapSource for FailingBootstrap {
    async fn bootstrap_data(&self) -> anyhow::Result<BootstrapData> {
        anyhow::bail!("bootstrap store offline")
    }
}

fn end_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn spike_series() -> MetricSeries {
    let mut values = vec![50.0; 9];
    values.push(95.0);
    MetricSeries::evenly_spaced(values, end_time(), TimeDelta::minutes(1))
}

fn cpu_batch() -> MetricBatch {
    let mut batch = MetricBatch::new();
    batch.insert("cpu".to_string(), spike_series());
    batch
}

async fn build(source: Arc<dyn MetricsSource>, sink: Option<Arc<RecordingSink>>) -> DetectionOrchestrator {
    let mut builder = DetectionOrchestrator::builder().source(source);
    if let Some(sink) = sink {
        builder = builder.alert_sink(sink.clone()).incident_sink(sink);
    }
    builder.build(&SyntheticBootstrap::default()).await.unwrap()
}

#[tokio::test]
async fn test_status_after_initialization() {
    let orchestrator = build(MockSource::new(cpu_batch()), None).await;
    let status = orchestrator.get_model_status();

    assert_eq!(status.models.len(), 4);
    assert!(status
        .models
        .values()
        .all(|m| m.status == ModelActivity::Active));

    let expected: Vec<&str> = {
        let mut m = DEFAULT_METRICS.to_vec();
        m.sort();
        m
    };
    let buffered: Vec<&str> = status.buffer_sizes.keys().map(String::as_str).collect();
    assert_eq!(buffered, expected);
    assert!(status.buffer_sizes.values().all(|len| *len == 0));
    assert_eq!(status.last_run, None);
    assert_eq!(status.state, CycleState::Idle);
    assert!(orchestrator.health().readiness().await.ready);
}

#[tokio::test]
async fn test_cycle_dispatches_and_buffers() {
    let sink = Arc::new(RecordingSink::default());
    let mut orchestrator = build(MockSource::new(cpu_batch()), Some(sink.clone())).await;

    let report = orchestrator.run_detection_cycle().await.unwrap();

    assert_eq!(report.metrics_evaluated, 1);
    assert_eq!(report.anomalies.len(), 1);
    let anomaly = &report.anomalies[0];
    assert_eq!(anomaly.value, 95.0);
    assert_eq!(anomaly.timestamp, end_time());

    let alerts = sink.alerts.lock().unwrap().clone();
    let incidents = sink.incidents.lock().unwrap().clone();
    assert_eq!(alerts, report.anomalies);
    let critical = report
        .anomalies
        .iter()
        .filter(|a| a.severity == Severity::Critical)
        .count();
    assert_eq!(incidents.len(), critical);

    assert_eq!(report.values_buffered, 10);
    let status = orchestrator.get_model_status();
    assert_eq!(status.buffer_sizes["cpu"], 10);
    assert_eq!(status.buffer_sizes["memory"], 0);
    assert_eq!(status.total_anomalies_detected, 1);
    assert!(status.last_run.is_some());
    assert_eq!(orchestrator.state(), CycleState::Idle);
}

#[tokio::test]
async fn test_collection_failure_leaves_buffers_unchanged() {
    let source = MockSource::new(cpu_batch());
    let mut orchestrator = build(source.clone(), None).await;

    orchestrator.run_detection_cycle().await.unwrap();
    let before = orchestrator.get_model_status().buffer_sizes;

    source.fail.store(true, Ordering::SeqCst);
    let err = orchestrator.run_detection_cycle().await.unwrap_err();
    assert!(matches!(err, DetectorError::Collection(_)));
    assert!(err.is_cycle_failure());

    let after = orchestrator.get_model_status();
    assert_eq!(after.buffer_sizes, before);
    assert_eq!(after.state, CycleState::Idle);
    assert_eq!(
        orchestrator
            .health()
            .status(components::METRICS_SOURCE)
            .await,
        Some(ComponentStatus::Degraded)
    );

    // The next cycle recovers
    source.fail.store(false, Ordering::SeqCst);
    orchestrator.run_detection_cycle().await.unwrap();
    assert_eq!(
        orchestrator
            .health()
            .status(components::METRICS_SOURCE)
            .await,
        Some(ComponentStatus::Healthy)
    );
}

#[tokio::test]
async fn test_repeated_cycles_are_idempotent() {
    let mut orchestrator = build(MockSource::new(cpu_batch()), None).await;

    let first = orchestrator.run_detection_cycle().await.unwrap();
    let second = orchestrator.run_detection_cycle().await.unwrap();

    assert_eq!(
        serde_json::to_string(&first.anomalies).unwrap(),
        serde_json::to_string(&second.anomalies).unwrap()
    );
    // Already-buffered timestamps are not appended twice
    assert_eq!(second.values_buffered, 0);
    assert_eq!(orchestrator.buffer("cpu").unwrap().len(), 10);
}

#[tokio::test]
async fn test_untimed_series_appended_every_cycle() {
    let mut batch = MetricBatch::new();
    batch.insert(
        "memory".to_string(),
        MetricSeries::new(vec![40.0, 41.0, 42.0], Vec::new()),
    );
    let mut orchestrator = build(MockSource::new(batch), None).await;

    orchestrator.run_detection_cycle().await.unwrap();
    orchestrator.run_detection_cycle().await.unwrap();

    assert_eq!(
        orchestrator.buffer("memory").unwrap().to_vec(),
        vec![40.0, 41.0, 42.0, 40.0, 41.0, 42.0]
    );
}

#[tokio::test]
async fn test_unconfigured_metric_scored_not_buffered() {
    let mut batch = MetricBatch::new();
    batch.insert("queue_depth".to_string(), spike_series());
    let mut orchestrator = build(MockSource::new(batch), None).await;

    let report = orchestrator.run_detection_cycle().await.unwrap();

    assert_eq!(report.anomalies.len(), 1);
    assert_eq!(report.values_buffered, 0);
    assert!(orchestrator.buffer("queue_depth").is_none());
    assert!(!orchestrator
        .get_model_status()
        .buffer_sizes
        .contains_key("queue_depth"));
}

#[tokio::test]
async fn test_sink_failures_do_not_fail_cycle() {
    let sink = Arc::new(RecordingSink {
        fail: true,
        ..Default::default()
    });
    let mut orchestrator = build(MockSource::new(cpu_batch()), Some(sink)).await;

    let report = orchestrator.run_detection_cycle().await.unwrap();

    assert_eq!(report.alert_failures, 1);
    assert_eq!(orchestrator.buffer("cpu").unwrap().len(), 10);
    assert_eq!(
        orchestrator.health().status(components::DISPATCH).await,
        Some(ComponentStatus::Degraded)
    );
}

#[tokio::test]
async fn test_short_series_yields_no_anomalies() {
    let mut batch = MetricBatch::new();
    batch.insert(
        "cpu".to_string(),
        MetricSeries::evenly_spaced(vec![50.0, 99.0, 50.0], end_time(), TimeDelta::minutes(1)),
    );
    let mut orchestrator = build(MockSource::new(batch), None).await;

    let report = orchestrator.run_detection_cycle().await.unwrap();
    assert!(report.anomalies.is_empty());
    assert_eq!(orchestrator.buffer("cpu").unwrap().len(), 3);
}

#[tokio::test]
async fn test_detect_anomalies_matches_cycle() {
    let orchestrator = build(MockSource::new(cpu_batch()), None).await;

    let results = orchestrator.detect_anomalies("cpu", &spike_series()).unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].description.contains("cpu"));
    assert!(results[0].description.contains("95.0"));
}

#[tokio::test]
async fn test_predict_future_anomalies() {
    let values: Vec<f64> = (0..60).map(|i| 20.0 + 0.5 * i as f64).collect();
    let mut batch = MetricBatch::new();
    batch.insert("disk".to_string(), MetricSeries::new(values, Vec::new()));
    let mut orchestrator = build(MockSource::new(batch), None).await;

    assert!(orchestrator.predict_future_anomalies("disk", 24).is_empty());

    orchestrator.run_detection_cycle().await.unwrap();
    let predictions = orchestrator.predict_future_anomalies("disk", 24);
    assert_eq!(predictions.len(), 24);
    assert!((predictions[0].predicted_value - 50.0).abs() < 1e-9);

    assert!(orchestrator.predict_future_anomalies("latency", 24).is_empty());
}

#[tokio::test]
async fn test_status_published_to_subscribers() {
    let mut orchestrator = build(MockSource::new(cpu_batch()), None).await;
    let rx = orchestrator.subscribe();
    assert_eq!(rx.borrow().buffer_sizes["cpu"], 0);

    orchestrator.run_detection_cycle().await.unwrap();

    let status = rx.borrow().clone();
    assert_eq!(status.buffer_sizes["cpu"], 10);
    assert_eq!(status.state, CycleState::Idle);
    assert_eq!(status.total_anomalies_detected, 1);
}

#[tokio::test]
async fn test_build_requires_source() {
    let result = DetectionOrchestrator::builder()
        .build(&SyntheticBootstrap::default())
        .await;
    assert!(matches!(result, Err(DetectorError::Config(_))));
}

#[tokio::test]
async fn test_bootstrap_failure_is_fatal() {
    let result = DetectionOrchestrator::builder()
        .source(MockSource::new(cpu_batch()))
        .build(&FailingBootstrap)
        .await;

    match result {
        Err(DetectorError::ModelInitialization { model, reason }) => {
            assert_eq!(model, "bootstrap");
            assert!(reason.contains("offline"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("build should fail"),
    }
}

#[tokio::test]
async fn test_fit_failure_marks_ensemble_unhealthy() {
    let health = HealthRegistry::new();
    let result = DetectionOrchestrator::builder()
        .source(MockSource::new(cpu_batch()))
        .health(health.clone())
        .build(&SyntheticBootstrap::new(3, 42))
        .await;

    assert!(matches!(result, Err(DetectorError::ModelInitialization { .. })));
    assert_eq!(
        health.status(components::ENSEMBLE).await,
        Some(ComponentStatus::Unhealthy)
    );
    assert!(!health.readiness().await.ready);
}

#[tokio::test]
async fn test_cancellation_completes_running_cycle() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = Arc::new(GatedSource {
        batch: cpu_batch(),
        entered: entered.clone(),
        release: release.clone(),
        calls: AtomicUsize::new(0),
    });

    let mut orchestrator = build(source.clone(), None).await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = tokio::spawn(async move {
        orchestrator.run(shutdown_rx).await;
        orchestrator
    });

    // Cancel while the first cycle is parked in collection
    entered.notified().await;
    shutdown_tx.send(()).unwrap();
    release.notify_one();

    let orchestrator = handle.await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.buffer("cpu").unwrap().len(), 10);
    assert_eq!(orchestrator.state(), CycleState::Idle);
    assert!(orchestrator.get_model_status().last_run.is_some());
}

#[tokio::test]
async fn test_run_exits_on_immediate_shutdown() {
    let source = MockSource::new(cpu_batch());
    let mut orchestrator = build(source.clone(), None).await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    shutdown_tx.send(()).unwrap();
    orchestrator.run(shutdown_rx).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}
