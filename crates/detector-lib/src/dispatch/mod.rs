//! Dispatch of anomaly results to alerting and incident collaborators
//!
//! Both sinks are fire-and-forget from the orchestrator's point of view: a
//! failing sink is logged and never fails the detection cycle.

mod alerter;
mod incident;

pub use alerter::{
    AlertSeverity, Alerter, AlertmanagerAlert, AlertmanagerPayload, DEFAULT_DEDUP_WINDOW,
};
pub use incident::{Incident, LoggingIncidentSink};

use crate::models::AnomalyResult;
use anyhow::Result;
use async_trait::async_trait;

/// Receives every surfaced anomaly
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, anomaly: &AnomalyResult) -> Result<()>;
}

/// Receives critical anomalies
#[async_trait]
pub trait IncidentSink: Send + Sync {
    async fn create_incident(&self, anomaly: &AnomalyResult) -> Result<()>;
}
