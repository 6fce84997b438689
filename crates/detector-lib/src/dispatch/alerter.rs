//! Alert emission for detected anomalies
//!
//! Handles:
//! - Formatting alerts for the Alertmanager webhook shape
//! - Deduplication per (metric, severity) within a configurable window

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AlertSink;
use crate::models::{AnomalyResult, Severity};

/// Default deduplication window (15 minutes)
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl From<Severity> for AlertSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => AlertSeverity::Critical,
            Severity::Warning | Severity::Info => AlertSeverity::Warning,
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Alertmanager webhook alert format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerAlert {
    /// Alert status (firing or resolved)
    pub status: String,
    /// Alert labels for routing and grouping
    pub labels: HashMap<String, String>,
    /// Alert annotations with details
    pub annotations: HashMap<String, String>,
    /// Start time in RFC3339 format
    pub starts_at: String,
    /// End time (empty for firing alerts)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
}

/// Alertmanager webhook payload (array of alerts)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertmanagerPayload {
    pub alerts: Vec<AlertmanagerAlert>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    metric: String,
    severity: Severity,
}

impl DedupKey {
    fn of(anomaly: &AnomalyResult) -> Self {
        Self {
            metric: anomaly.metric_name.clone(),
            severity: anomaly.severity,
        }
    }
}

/// Alert emitter with deduplication
pub struct Alerter {
    dedup_window: Duration,
    /// Recent alerts (key -> last emission time)
    recent_alerts: RwLock<HashMap<DedupKey, Instant>>,
    /// Instance label attached to every alert
    instance: String,
}

impl Alerter {
    /// Create a new alerter with the default 15-minute deduplication window
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            dedup_window: DEFAULT_DEDUP_WINDOW,
            recent_alerts: RwLock::new(HashMap::new()),
            instance: instance.into(),
        }
    }

    /// Set custom deduplication window
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Check if an alert should be suppressed due to deduplication
    pub fn should_suppress(&self, anomaly: &AnomalyResult) -> bool {
        let alerts = self
            .recent_alerts
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        alerts
            .get(&DedupKey::of(anomaly))
            .is_some_and(|last| last.elapsed() < self.dedup_window)
    }

    /// Record that an alert was emitted
    fn record_alert(&self, anomaly: &AnomalyResult) {
        let mut alerts = self
            .recent_alerts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        alerts.insert(DedupKey::of(anomaly), Instant::now());

        // Clean up old entries
        alerts.retain(|_, time| time.elapsed() < self.dedup_window);
    }

    /// Build the alert for an anomaly unless a duplicate was emitted recently
    pub fn prepare(&self, anomaly: &AnomalyResult) -> Option<AlertmanagerAlert> {
        if self.should_suppress(anomaly) {
            return None;
        }
        let alert = self.create_alertmanager_alert(anomaly);
        self.record_alert(anomaly);
        Some(alert)
    }

    /// Create an Alertmanager alert for an anomaly
    pub fn create_alertmanager_alert(&self, anomaly: &AnomalyResult) -> AlertmanagerAlert {
        let severity = AlertSeverity::from(anomaly.severity);

        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), "MetricAnomaly".to_string());
        labels.insert("severity".to_string(), severity.to_string());
        labels.insert("metric".to_string(), anomaly.metric_name.clone());
        labels.insert("instance".to_string(), self.instance.clone());

        let mut annotations = HashMap::new();
        annotations.insert(
            "summary".to_string(),
            format!("Anomaly detected in {}", anomaly.metric_name),
        );
        annotations.insert("description".to_string(), anomaly.description.clone());
        annotations.insert(
            "anomaly_score".to_string(),
            format!("{:.4}", anomaly.anomaly_score),
        );
        annotations.insert("confidence".to_string(), format!("{:.4}", anomaly.confidence));
        annotations.insert("value".to_string(), format!("{:.4}", anomaly.value));
        if !anomaly.recommendations.is_empty() {
            annotations.insert(
                "recommendations".to_string(),
                anomaly.recommendations.join("; "),
            );
        }

        AlertmanagerAlert {
            status: "firing".to_string(),
            labels,
            annotations,
            starts_at: anomaly.timestamp.to_rfc3339(),
            ends_at: None,
        }
    }

    /// Create an Alertmanager payload from multiple alerts
    pub fn create_alertmanager_payload(alerts: Vec<AlertmanagerAlert>) -> AlertmanagerPayload {
        AlertmanagerPayload { alerts }
    }
}

#[async_trait]
impl AlertSink for Alerter {
    async fn send_alert(&self, anomaly: &AnomalyResult) -> Result<()> {
        let Some(alert) = self.prepare(anomaly) else {
            debug!(
                metric = %anomaly.metric_name,
                severity = %anomaly.severity,
                "Alert suppressed by deduplication"
            );
            return Ok(());
        };

        let payload = serde_json::to_string(&Self::create_alertmanager_payload(vec![alert]))?;
        info!(
            event = "alert_sent",
            metric = %anomaly.metric_name,
            severity = %anomaly.severity,
            payload = %payload,
            "Alert emitted"
        );
        Ok(())
    }
}
