//! Ensemble anomaly detection and forecasting engine
//!
//! This crate provides the core functionality for:
//! - Cleaning and scoring metric series with an ensemble of detector models
//! - Severity classification, confidence estimation and narration
//! - Short-horizon trend forecasting from rolling buffers
//! - The periodic detection cycle and its collaborators
//! - Health checks and observability

pub mod anomaly;
pub mod collector;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod predictor;

pub use error::{DetectorError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DetectorMetrics, StructuredLogger};
pub use orchestrator::{
    CycleReport, DetectionOrchestrator, DetectorConfig, OrchestratorBuilder, DEFAULT_METRICS,
};
