//! Observability infrastructure for the detector
//!
//! Provides:
//! - Prometheus metrics (cycle latency, anomaly counts, error counters, buffer lengths)
//! - Structured JSON logging with tracing

use crate::models::{AnomalyResult, Severity};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cycle latency (in seconds)
const CYCLE_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

struct DetectorMetricsInner {
    cycle_latency_seconds: Histogram,
    cycles_completed: IntCounter,
    cycle_errors: IntCounter,
    collection_errors: IntCounter,
    dispatch_failures: IntCounterVec,
    anomalies_detected: IntCounterVec,
    buffer_len: IntGaugeVec,
    models_active: IntGauge,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "sentinel_cycle_latency_seconds",
                "Time spent in one detection cycle",
                CYCLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            cycles_completed: register_int_counter!(
                "sentinel_cycles_completed_total",
                "Detection cycles that ran to completion"
            )
            .expect("Failed to register cycles_completed"),

            cycle_errors: register_int_counter!(
                "sentinel_cycle_errors_total",
                "Detection cycles abandoned because of a collection or scoring failure"
            )
            .expect("Failed to register cycle_errors"),

            collection_errors: register_int_counter!(
                "sentinel_collection_errors_total",
                "Metric collection failures"
            )
            .expect("Failed to register collection_errors"),

            dispatch_failures: register_int_counter_vec!(
                "sentinel_dispatch_failures_total",
                "Alert or incident deliveries that failed",
                &["sink"]
            )
            .expect("Failed to register dispatch_failures"),

            anomalies_detected: register_int_counter_vec!(
                "sentinel_anomalies_detected_total",
                "Anomalies surfaced by the detection pipeline",
                &["metric", "severity"]
            )
            .expect("Failed to register anomalies_detected"),

            buffer_len: register_int_gauge_vec!(
                "sentinel_buffer_len",
                "Values held in each metric's rolling buffer",
                &["metric"]
            )
            .expect("Failed to register buffer_len"),

            models_active: register_int_gauge!(
                "sentinel_models_active",
                "Detector models fitted and ready to score"
            )
            .expect("Failed to register models_active"),
        }
    }
}

/// Detector metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct DetectorMetrics {
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new)
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    pub fn inc_cycles_completed(&self) {
        self.inner().cycles_completed.inc();
    }

    pub fn inc_cycle_errors(&self) {
        self.inner().cycle_errors.inc();
    }

    pub fn inc_collection_errors(&self) {
        self.inner().collection_errors.inc();
    }

    /// `sink` is "alert" or "incident"
    pub fn inc_dispatch_failures(&self, sink: &str) {
        self.inner()
            .dispatch_failures
            .with_label_values(&[sink])
            .inc();
    }

    pub fn inc_anomalies_detected(&self, metric: &str, severity: Severity) {
        let severity = severity.to_string();
        self.inner()
            .anomalies_detected
            .with_label_values(&[metric, severity.as_str()])
            .inc();
    }

    pub fn set_buffer_len(&self, metric: &str, len: usize) {
        self.inner()
            .buffer_len
            .with_label_values(&[metric])
            .set(len as i64);
    }

    pub fn set_models_active(&self, count: usize) {
        self.inner().models_active.set(count as i64);
    }
}

/// Structured logger for detector events
///
/// Provides consistent JSON-formatted logging for anomalies, cycle
/// failures and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Log an anomaly surfaced by the pipeline
    pub fn log_anomaly(&self, anomaly: &AnomalyResult) {
        match anomaly.severity {
            Severity::Critical => {
                warn!(
                    event = "anomaly_detected",
                    instance = %self.instance,
                    metric = %anomaly.metric_name,
                    severity = %anomaly.severity,
                    value = anomaly.value,
                    anomaly_score = anomaly.anomaly_score,
                    confidence = anomaly.confidence,
                    timestamp = %anomaly.timestamp.to_rfc3339(),
                    "Critical anomaly detected"
                );
            }
            _ => {
                info!(
                    event = "anomaly_detected",
                    instance = %self.instance,
                    metric = %anomaly.metric_name,
                    severity = %anomaly.severity,
                    value = anomaly.value,
                    anomaly_score = anomaly.anomaly_score,
                    confidence = anomaly.confidence,
                    timestamp = %anomaly.timestamp.to_rfc3339(),
                    "Anomaly detected"
                );
            }
        }
    }

    /// Log an abandoned detection cycle
    pub fn log_cycle_failure(&self, error: &dyn std::error::Error) {
        warn!(
            event = "cycle_failed",
            instance = %self.instance,
            error = %error,
            "Detection cycle abandoned, buffers left unchanged"
        );
    }

    /// Log a completed detection cycle
    pub fn log_cycle_complete(&self, metrics: usize, anomalies: usize, duration_secs: f64) {
        info!(
            event = "cycle_completed",
            instance = %self.instance,
            metrics = metrics,
            anomalies = anomalies,
            duration_secs = duration_secs,
            "Detection cycle completed"
        );
    }

    /// Log detector startup
    pub fn log_startup(&self, version: &str, models: usize, metrics: &[String]) {
        info!(
            event = "detector_started",
            instance = %self.instance,
            version = %version,
            models = models,
            metrics = ?metrics,
            "Anomaly detector started"
        );
    }

    /// Log detector shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "detector_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Anomaly detector shutting down"
        );
    }
}
