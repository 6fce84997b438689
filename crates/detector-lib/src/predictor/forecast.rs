//! Short-horizon trend extrapolation
//!
//! Every horizon step is computed independently from the same base window:
//! a linear trend over the last few values, a confidence band from recent
//! volatility, and an anomaly score of the predicted value against the full
//! buffered history.

use super::buffer::RollingBuffer;
use crate::anomaly::{mean, std_dev, STD_EPSILON};
use crate::error::{DetectorError, Result};
use crate::models::ModelPrediction;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use tracing::debug;

/// Name reported on every prediction
pub const FORECAST_MODEL_NAME: &str = "linear_trend";

/// Default number of steps to extrapolate
pub const DEFAULT_HORIZON: usize = 24;

/// Longest horizon served; larger requests are capped
pub const MAX_HORIZON: usize = 24 * 365;

/// Minimum buffered values required to forecast
pub const MIN_FORECAST_HISTORY: usize = 50;

/// Forecast tuning
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Minimum buffered values required
    pub min_history: usize,
    /// Values used for the first-difference trend
    pub trend_window: usize,
    /// Values used for the confidence band
    pub volatility_window: usize,
    /// Time between horizon steps
    pub step: TimeDelta,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_history: MIN_FORECAST_HISTORY,
            trend_window: 10,
            volatility_window: 20,
            step: TimeDelta::hours(1),
        }
    }
}

/// Extrapolates a metric's recent trend from its rolling buffer
#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Predict `horizon` future points starting from `now`
    ///
    /// Fails with `ForecastUnavailable` when the buffer holds fewer than
    /// `min_history` values.
    pub fn forecast(
        &self,
        buffer: &RollingBuffer,
        horizon: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ModelPrediction>> {
        if buffer.len() < self.config.min_history {
            return Err(DetectorError::ForecastUnavailable {
                len: buffer.len(),
                required: self.config.min_history,
            });
        }

        let history = buffer.to_vec();
        let last = buffer.last().unwrap_or_default();
        let trend = linear_trend(&buffer.tail(self.config.trend_window));
        let band = 2.0 * std_dev(&buffer.tail(self.config.volatility_window));
        let history_mean = mean(&history);
        let history_std = std_dev(&history);

        if horizon > MAX_HORIZON {
            debug!(horizon, max = MAX_HORIZON, "Forecast horizon capped");
        }

        // Stops early once a step timestamp leaves the representable range
        Ok((1..=horizon.min(MAX_HORIZON))
            .map_while(|h| {
                let timestamp = self.step_timestamp(now, h)?;
                let predicted_value = last + trend * h as f64;
                let z = (predicted_value - history_mean).abs() / (history_std + STD_EPSILON);

                Some(ModelPrediction {
                    predicted_value,
                    confidence_interval: [predicted_value - band, predicted_value + band],
                    anomaly_score: (z / 3.0).tanh(),
                    model_name: FORECAST_MODEL_NAME.to_string(),
                    timestamp,
                })
            })
            .collect())
    }

    fn step_timestamp(&self, now: DateTime<Utc>, h: usize) -> Option<DateTime<Utc>> {
        let steps = i32::try_from(h).ok()?;
        now.checked_add_signed(self.config.step.checked_mul(steps)?)
    }
}

/// Mean of first differences (0 for fewer than two values)
pub fn linear_trend(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let diffs = values.windows(2).map(|w| w[1] - w[0]);
    diffs.sum::<f64>() / (values.len() - 1) as f64
}
