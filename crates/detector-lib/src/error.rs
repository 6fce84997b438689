//! Error taxonomy for the detection engine
//!
//! Only initialization and configuration failures are fatal. Everything else
//! is recovered by the caller closest to it: insufficient data and missing
//! forecast history become empty results, collection and scoring failures
//! abandon a single detection cycle.

use thiserror::Error;

/// Errors raised by the detection engine
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Series is shorter than the minimum needed for meaningful scoring
    #[error("insufficient data: {len} points, need at least {required}")]
    InsufficientData { len: usize, required: usize },

    /// A detector model could not be fitted during startup
    #[error("model '{model}' failed to initialize: {reason}")]
    ModelInitialization { model: String, reason: String },

    /// The metrics source failed during a running cycle
    #[error("metrics collection failed: {0:#}")]
    Collection(anyhow::Error),

    /// A detector model failed while scoring a series
    #[error("model '{model}' failed to score series: {reason}")]
    Scoring { model: String, reason: String },

    /// Not enough buffered history to extrapolate a trend
    #[error("forecast unavailable: {len} buffered points, need at least {required}")]
    ForecastUnavailable { len: usize, required: usize },

    /// Invalid thresholds or other configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DetectorError {
    /// Whether this error abandons a running detection cycle
    /// (as opposed to being recovered locally or aborting startup)
    pub fn is_cycle_failure(&self) -> bool {
        matches!(self, DetectorError::Collection(_) | DetectorError::Scoring { .. })
    }
}

pub type Result<T> = std::result::Result<T, DetectorError>;
