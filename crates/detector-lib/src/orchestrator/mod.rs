//! Periodic detection cycle
//!
//! The orchestrator exclusively owns the fitted pipeline, per-metric rolling
//! buffers and the collaborator handles. One cycle moves through
//! `Collecting -> Detecting -> Dispatching -> BufferUpdating` and back to
//! `Idle`. A collection or scoring failure abandons the cycle before any
//! buffer is touched; sink failures are logged and never fail the cycle.

mod scheduler;

#[cfg(test)]
mod tests;

use crate::anomaly::{AnomalyPipeline, DetectorEnsemble, Preprocessor, ThresholdTable, MIN_POINTS};
use crate::collector::{BootstrapSource, MetricsSource};
use crate::dispatch::{AlertSink, Alerter, IncidentSink, LoggingIncidentSink};
use crate::error::{DetectorError, Result};
use crate::health::{components, HealthRegistry};
use crate::models::{
    AnomalyResult, CycleState, MetricBatch, MetricSeries, ModelPrediction, ModelStatus, Severity,
};
use crate::observability::{DetectorMetrics, StructuredLogger};
use crate::predictor::{ForecastConfig, ForecastEngine, RollingBuffer, DEFAULT_BUFFER_CAPACITY};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default interval between detection cycles
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(30);

/// Metrics that get a rolling buffer unless configured otherwise
pub const DEFAULT_METRICS: [&str; 5] = ["cpu", "memory", "disk", "network", "response_time"];

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Time between cycles (default: 30 seconds)
    pub interval: Duration,
    /// Rolling buffer capacity per metric (default: 1000)
    pub buffer_capacity: usize,
    /// Minimum series length for scoring (default: 10)
    pub min_points: usize,
    pub forecast: ForecastConfig,
    /// Metrics that get a rolling buffer; others are scored but not buffered
    pub metrics: Vec<String>,
    /// Instance label for logs and alerts
    pub instance: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CYCLE_INTERVAL,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            min_points: MIN_POINTS,
            forecast: ForecastConfig::default(),
            metrics: DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
            instance: "sentinel".to_string(),
        }
    }
}

/// Outcome of one completed cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub started_at: Option<DateTime<Utc>>,
    pub metrics_evaluated: usize,
    pub anomalies: Vec<AnomalyResult>,
    pub alert_failures: usize,
    pub incident_failures: usize,
    /// Raw values appended to rolling buffers
    pub values_buffered: usize,
}

/// Drives collection, detection, dispatch and buffering
pub struct DetectionOrchestrator {
    config: DetectorConfig,
    pipeline: AnomalyPipeline,
    forecaster: ForecastEngine,
    buffers: BTreeMap<String, RollingBuffer>,
    /// Newest timestamp already buffered per metric
    watermarks: HashMap<String, DateTime<Utc>>,
    source: Arc<dyn MetricsSource>,
    alerts: Arc<dyn AlertSink>,
    incidents: Arc<dyn IncidentSink>,
    health: HealthRegistry,
    metrics: DetectorMetrics,
    logger: StructuredLogger,
    state: CycleState,
    last_run: Option<DateTime<Utc>>,
    total_anomalies: u64,
    status_tx: watch::Sender<ModelStatus>,
}

impl DetectionOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Receiver for status snapshots published after every state change
    pub fn subscribe(&self) -> watch::Receiver<ModelStatus> {
        self.status_tx.subscribe()
    }

    /// Rolling buffer for a configured metric
    pub fn buffer(&self, metric: &str) -> Option<&RollingBuffer> {
        self.buffers.get(metric)
    }

    /// Run one full cycle
    ///
    /// Errors are already logged and counted; they are returned so callers
    /// and tests can observe them.
    pub async fn run_detection_cycle(&mut self) -> Result<CycleReport> {
        let start = Instant::now();
        let result = self.execute_cycle().await;
        let elapsed = start.elapsed().as_secs_f64();

        self.last_run = Some(Utc::now());
        self.metrics.observe_cycle_latency(elapsed);

        match &result {
            Ok(report) => {
                self.metrics.inc_cycles_completed();
                self.logger
                    .log_cycle_complete(report.metrics_evaluated, report.anomalies.len(), elapsed);
            }
            Err(e) => {
                self.metrics.inc_cycle_errors();
                if let DetectorError::Scoring { .. } = e {
                    self.health
                        .record_failure(components::ENSEMBLE, e.to_string())
                        .await;
                }
                self.logger.log_cycle_failure(e);
            }
        }

        self.set_state(CycleState::Idle);
        result
    }

    async fn execute_cycle(&mut self) -> Result<CycleReport> {
        let started_at = Utc::now();

        self.set_state(CycleState::Collecting);
        let batch = match self.source.collect_all_metrics().await {
            Ok(batch) => {
                self.health.record_success(components::METRICS_SOURCE).await;
                batch
            }
            Err(e) => {
                self.metrics.inc_collection_errors();
                self.health
                    .record_failure(components::METRICS_SOURCE, format!("{e:#}"))
                    .await;
                return Err(DetectorError::Collection(e));
            }
        };

        // Deterministic evaluation order regardless of map iteration
        let mut names: Vec<&String> = batch.keys().collect();
        names.sort();

        self.set_state(CycleState::Detecting);
        let mut anomalies = Vec::new();
        for name in &names {
            anomalies.extend(self.pipeline.detect(name, &batch[*name])?);
        }
        self.health.record_success(components::ENSEMBLE).await;

        self.set_state(CycleState::Dispatching);
        let (alert_failures, incident_failures) = self.dispatch(&anomalies).await;

        self.set_state(CycleState::BufferUpdating);
        let values_buffered = self.update_buffers(&batch);

        Ok(CycleReport {
            started_at: Some(started_at),
            metrics_evaluated: names.len(),
            anomalies,
            alert_failures,
            incident_failures,
            values_buffered,
        })
    }

    /// Hand every anomaly to the sinks, critical ones to incidents first
    async fn dispatch(&mut self, anomalies: &[AnomalyResult]) -> (usize, usize) {
        let mut alert_failures = 0;
        let mut incident_failures = 0;

        for anomaly in anomalies {
            self.total_anomalies += 1;
            self.metrics
                .inc_anomalies_detected(&anomaly.metric_name, anomaly.severity);
            self.logger.log_anomaly(anomaly);

            if anomaly.severity == Severity::Critical {
                if let Err(e) = self.incidents.create_incident(anomaly).await {
                    incident_failures += 1;
                    self.metrics.inc_dispatch_failures("incident");
                    warn!(metric = %anomaly.metric_name, error = %e, "Failed to create incident");
                }
            }

            if let Err(e) = self.alerts.send_alert(anomaly).await {
                alert_failures += 1;
                self.metrics.inc_dispatch_failures("alert");
                warn!(metric = %anomaly.metric_name, error = %e, "Failed to send alert");
            }
        }

        if alert_failures + incident_failures > 0 {
            self.health
                .record_failure(
                    components::DISPATCH,
                    format!("{alert_failures} alert and {incident_failures} incident deliveries failed"),
                )
                .await;
        } else if !anomalies.is_empty() {
            self.health.record_success(components::DISPATCH).await;
        }

        (alert_failures, incident_failures)
    }

    /// Append values newer than each metric's watermark
    ///
    /// Metrics without a configured buffer are ignored. When timestamps do
    /// not cover every value the whole series is appended.
    fn update_buffers(&mut self, batch: &MetricBatch) -> usize {
        let mut appended = 0;

        for (name, buffer) in self.buffers.iter_mut() {
            let Some(series) = batch.get(name) else {
                continue;
            };

            let watermark = self.watermarks.get(name).copied();
            let fresh = fresh_values(series, watermark);
            appended += fresh.len();
            buffer.extend(fresh);

            if let Some(newest) = series.timestamps.iter().max() {
                let advanced = watermark.map_or(*newest, |w| w.max(*newest));
                self.watermarks.insert(name.clone(), advanced);
            }
            self.metrics.set_buffer_len(name, buffer.len());
        }

        debug!(appended, "Rolling buffers updated");
        appended
    }

    /// Detect anomalies in one series against the fitted models
    pub fn detect_anomalies(&self, metric: &str, series: &MetricSeries) -> Result<Vec<AnomalyResult>> {
        self.pipeline.detect(metric, series)
    }

    /// Forecast `horizon` steps from the metric's rolling buffer
    ///
    /// Returns an empty list for unknown metrics or short history.
    pub fn predict_future_anomalies(&self, metric: &str, horizon: usize) -> Vec<ModelPrediction> {
        let Some(buffer) = self.buffers.get(metric) else {
            debug!(metric = %metric, "No rolling buffer for metric");
            return Vec::new();
        };

        match self.forecaster.forecast(buffer, horizon, Utc::now()) {
            Ok(predictions) => predictions,
            Err(e) => {
                debug!(metric = %metric, error = %e, "Forecast unavailable");
                Vec::new()
            }
        }
    }

    /// Snapshot of models, buffers and cycle bookkeeping
    pub fn get_model_status(&self) -> ModelStatus {
        ModelStatus {
            models: self.pipeline.ensemble().status(),
            buffer_sizes: self
                .buffers
                .iter()
                .map(|(name, buffer)| (name.clone(), buffer.len()))
                .collect(),
            last_run: self.last_run,
            state: self.state,
            total_anomalies_detected: self.total_anomalies,
        }
    }

    fn set_state(&mut self, state: CycleState) {
        self.state = state;
        self.status_tx.send_replace(self.get_model_status());
    }
}

/// Values of `series` not yet buffered
fn fresh_values(series: &MetricSeries, watermark: Option<DateTime<Utc>>) -> Vec<f64> {
    match watermark {
        Some(watermark) if series.timestamps.len() >= series.values.len() => series
            .samples()
            .filter(|s| s.timestamp > watermark)
            .map(|s| s.value)
            .collect(),
        _ => series.values.clone(),
    }
}

/// Builder for a fitted `DetectionOrchestrator`
pub struct OrchestratorBuilder {
    source: Option<Arc<dyn MetricsSource>>,
    alerts: Option<Arc<dyn AlertSink>>,
    incidents: Option<Arc<dyn IncidentSink>>,
    ensemble: DetectorEnsemble,
    thresholds: ThresholdTable,
    config: DetectorConfig,
    health: HealthRegistry,
}

impl OrchestratorBuilder {
    /// Create a new builder with the standard ensemble and default thresholds
    pub fn new() -> Self {
        Self {
            source: None,
            alerts: None,
            incidents: None,
            ensemble: DetectorEnsemble::standard(),
            thresholds: ThresholdTable::default(),
            config: DetectorConfig::default(),
            health: HealthRegistry::new(),
        }
    }

    /// Set the metrics source (required)
    pub fn source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(sink);
        self
    }

    pub fn incident_sink(mut self, sink: Arc<dyn IncidentSink>) -> Self {
        self.incidents = Some(sink);
        self
    }

    pub fn ensemble(mut self, ensemble: DetectorEnsemble) -> Self {
        self.ensemble = ensemble;
        self
    }

    pub fn thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a health registry with the ops endpoints
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    /// Fit the models and build the orchestrator
    ///
    /// Any bootstrap or fit failure is fatal.
    pub async fn build(self, bootstrap: &dyn BootstrapSource) -> Result<DetectionOrchestrator> {
        let source = self
            .source
            .ok_or_else(|| DetectorError::Config("metrics source is required".to_string()))?;
        let alerts: Arc<dyn AlertSink> = match self.alerts {
            Some(sink) => sink,
            None => Arc::new(Alerter::new(self.config.instance.clone())),
        };
        let incidents: Arc<dyn IncidentSink> = match self.incidents {
            Some(sink) => sink,
            None => Arc::new(LoggingIncidentSink::new()),
        };

        let health = self.health;
        health.register(components::ENSEMBLE).await;
        health.register(components::METRICS_SOURCE).await;
        health.register(components::DISPATCH).await;

        let data = bootstrap.bootstrap_data().await.map_err(|e| {
            DetectorError::ModelInitialization {
                model: "bootstrap".to_string(),
                reason: format!("{e:#}"),
            }
        })?;

        let mut pipeline = AnomalyPipeline::new(
            Preprocessor::with_min_points(self.config.min_points),
            self.ensemble,
            self.thresholds,
        );
        if let Err(e) = pipeline.fit(&data) {
            health.set_unhealthy(components::ENSEMBLE, e.to_string()).await;
            return Err(e);
        }

        let buffers = self
            .config
            .metrics
            .iter()
            .map(|m| (m.clone(), RollingBuffer::new(self.config.buffer_capacity)))
            .collect();

        let metrics = DetectorMetrics::new();
        metrics.set_models_active(pipeline.ensemble().len());

        let (status_tx, _) = watch::channel(ModelStatus::default());
        let orchestrator = DetectionOrchestrator {
            forecaster: ForecastEngine::new(self.config.forecast.clone()),
            logger: StructuredLogger::new(self.config.instance.clone()),
            config: self.config,
            pipeline,
            buffers,
            watermarks: HashMap::new(),
            source,
            alerts,
            incidents,
            health: health.clone(),
            metrics,
            state: CycleState::Idle,
            last_run: None,
            total_anomalies: 0,
            status_tx,
        };
        orchestrator
            .status_tx
            .send_replace(orchestrator.get_model_status());

        health.set_ready(true).await;
        info!(
            models = orchestrator.pipeline.ensemble().len(),
            metrics = orchestrator.buffers.len(),
            "Detection orchestrator initialized"
        );
        Ok(orchestrator)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
