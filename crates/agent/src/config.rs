//! Agent configuration
//!
//! Loaded from an optional `sentinel.toml` in the working directory, then
//! overridden by `SENTINEL_*` environment variables (nested keys use `__`,
//! e.g. `SENTINEL_THRESHOLDS__CPU__WARNING=0.6`).

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use detector_lib::anomaly::{ThresholdTable, Thresholds};
use detector_lib::predictor::ForecastConfig;
use detector_lib::{DetectorConfig, DEFAULT_METRICS};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Instance label for logs and alerts
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health/metrics/status
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Detection cycle interval in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Rolling buffer capacity per metric
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Minimum series length for scoring
    #[serde(default = "default_min_points")]
    pub min_points: usize,

    /// Metrics that get a rolling buffer
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,

    /// Root of the proc filesystem to sample
    #[serde(default = "default_proc_root")]
    pub proc_root: String,

    /// Samples kept per metric by the host source
    #[serde(default = "default_sample_window")]
    pub sample_window: usize,

    /// Alert deduplication window in seconds
    #[serde(default = "default_alert_dedup")]
    pub alert_dedup_secs: u64,

    /// Hours between forecast steps
    #[serde(default = "default_forecast_step_hours")]
    pub forecast_step_hours: i64,

    #[serde(default = "default_bootstrap_samples")]
    pub bootstrap_samples: usize,

    #[serde(default = "default_bootstrap_seed")]
    pub bootstrap_seed: u64,

    /// Per-metric overrides on top of the default threshold table
    #[serde(default)]
    pub thresholds: HashMap<String, Thresholds>,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "sentinel".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_interval() -> u64 {
    30
}

fn default_buffer_capacity() -> usize {
    1000
}

fn default_min_points() -> usize {
    10
}

fn default_metrics() -> Vec<String> {
    DEFAULT_METRICS.iter().map(|m| m.to_string()).collect()
}

fn default_proc_root() -> String {
    "/proc".to_string()
}

fn default_sample_window() -> usize {
    60
}

fn default_alert_dedup() -> u64 {
    15 * 60
}

fn default_forecast_step_hours() -> i64 {
    1
}

fn default_bootstrap_samples() -> usize {
    1000
}

fn default_bootstrap_seed() -> u64 {
    42
}

impl AgentConfig {
    /// Load configuration from `sentinel.toml` (optional) and environment
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(File::with_name("sentinel").required(false))
            .add_source(
                Environment::with_prefix("SENTINEL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("metrics"),
            );
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Invalid agent configuration")
    }

    /// Orchestrator settings derived from this configuration
    pub fn detector_config(&self) -> Result<DetectorConfig> {
        if self.forecast_step_hours <= 0 {
            anyhow::bail!(
                "Invalid agent configuration: forecast_step_hours must be positive, got {}",
                self.forecast_step_hours
            );
        }
        let step = chrono::Duration::try_hours(self.forecast_step_hours).with_context(|| {
            format!(
                "Invalid agent configuration: forecast_step_hours {} is out of range",
                self.forecast_step_hours
            )
        })?;

        Ok(DetectorConfig {
            interval: Duration::from_secs(self.interval_secs.max(1)),
            buffer_capacity: self.buffer_capacity,
            min_points: self.min_points,
            forecast: ForecastConfig {
                step,
                ..ForecastConfig::default()
            },
            metrics: self.metrics.clone(),
            instance: self.instance.clone(),
        })
    }

    /// Default thresholds with configured overrides applied
    pub fn threshold_table(&self) -> detector_lib::Result<ThresholdTable> {
        let mut overrides: Vec<(&String, &Thresholds)> = self.thresholds.iter().collect();
        overrides.sort_by(|a, b| a.0.cmp(b.0));

        overrides
            .into_iter()
            .try_fold(ThresholdTable::default(), |table, (metric, t)| {
                table.with_override(metric, *t)
            })
    }

    pub fn alert_dedup_window(&self) -> Duration {
        Duration::from_secs(self.alert_dedup_secs)
    }
}
