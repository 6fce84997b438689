//! Incident creation for critical anomalies

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use super::IncidentSink;
use crate::models::{AnomalyResult, Severity};

/// Incident record handed to the log
#[derive(Debug, Clone, Serialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub metric_name: String,
    pub description: String,
    pub recommendations: Vec<String>,
}

impl Incident {
    pub fn from_anomaly(sequence: u64, anomaly: &AnomalyResult) -> Self {
        Self {
            id: format!(
                "INC-{}-{}-{sequence}",
                anomaly.metric_name,
                anomaly.timestamp.format("%Y%m%d%H%M%S")
            ),
            title: format!("Critical anomaly in {}", anomaly.metric_name),
            severity: anomaly.severity,
            metric_name: anomaly.metric_name.clone(),
            description: anomaly.description.clone(),
            recommendations: anomaly.recommendations.clone(),
        }
    }
}

/// Records incidents in the structured log
#[derive(Debug, Default)]
pub struct LoggingIncidentSink {
    created: AtomicU64,
}

impl LoggingIncidentSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of incidents created so far
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl IncidentSink for LoggingIncidentSink {
    async fn create_incident(&self, anomaly: &AnomalyResult) -> Result<()> {
        let sequence = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        let incident = Incident::from_anomaly(sequence, anomaly);
        let record = serde_json::to_string(&incident)?;

        warn!(
            event = "incident_created",
            incident_id = %incident.id,
            metric = %incident.metric_name,
            severity = %incident.severity,
            incident = %record,
            "{}", incident.title
        );
        Ok(())
    }
}
