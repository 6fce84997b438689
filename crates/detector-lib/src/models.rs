//! Core data models for the detection engine

use chrono::{DateTime, Duration as TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A single observation of a metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Time-ascending batch of observations for one metric
///
/// Values and timestamps are paired by index. When the two sequences have
/// different lengths only the first `min(values, timestamps)` points are
/// paired; unpaired values still count as raw observations for buffering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub values: Vec<f64>,
    #[serde(default)]
    pub timestamps: Vec<DateTime<Utc>>,
}

impl MetricSeries {
    pub fn new(values: Vec<f64>, timestamps: Vec<DateTime<Utc>>) -> Self {
        Self { values, timestamps }
    }

    /// Build a series with evenly spaced timestamps ending at `end`
    ///
    /// Oldest values whose timestamp would fall before chrono's minimum date
    /// are dropped.
    pub fn evenly_spaced(mut values: Vec<f64>, end: DateTime<Utc>, step: TimeDelta) -> Self {
        let mut timestamps: Vec<DateTime<Utc>> = std::iter::successors(Some(end), |t| {
            t.checked_sub_signed(step)
        })
        .take(values.len())
        .collect();
        timestamps.reverse();
        values.drain(..values.len() - timestamps.len());
        Self { values, timestamps }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Paired (timestamp, value) samples
    pub fn samples(&self) -> impl Iterator<Item = MetricSample> + '_ {
        self.timestamps
            .iter()
            .zip(self.values.iter())
            .map(|(&timestamp, &value)| MetricSample { timestamp, value })
    }
}

/// One collection batch: metric name -> series
pub type MetricBatch = HashMap<String, MetricSeries>;

/// Bootstrap series per metric, ordered by name so fitting is deterministic
pub type BootstrapData = BTreeMap<String, Vec<f64>>;

/// Anomaly severity tiers, ordered `Info < Warning < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A flagged point emitted by the detection pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub timestamp: DateTime<Utc>,
    pub metric_name: String,
    pub value: f64,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    pub confidence: f64,
    pub severity: Severity,
    pub description: String,
    pub recommendations: Vec<String>,
}

/// Forecast for a single horizon step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub predicted_value: f64,
    /// `[low, high]`
    pub confidence_interval: [f64; 2],
    pub anomaly_score: f64,
    pub model_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Orchestrator cycle phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    #[default]
    Idle,
    Collecting,
    Detecting,
    Dispatching,
    BufferUpdating,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Collecting => "collecting",
            CycleState::Detecting => "detecting",
            CycleState::Dispatching => "dispatching",
            CycleState::BufferUpdating => "buffer_updating",
        };
        f.write_str(name)
    }
}

/// Whether a detector model is ready to score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelActivity {
    Active,
    Inactive,
}

/// Status of one ensemble member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub status: ModelActivity,
    pub kind: String,
    pub weight: f64,
}

/// Snapshot reported by `get_model_status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub models: BTreeMap<String, ModelState>,
    pub buffer_sizes: BTreeMap<String, usize>,
    pub last_run: Option<DateTime<Utc>>,
    pub state: CycleState,
    pub total_anomalies_detected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn test_samples_pair_to_shorter_length() {
        let now = Utc::now();
        let series = MetricSeries::new(vec![1.0, 2.0, 3.0], vec![now, now]);
        assert_eq!(series.samples().count(), 2);
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_evenly_spaced_timestamps() {
        let end = Utc::now();
        let series = MetricSeries::evenly_spaced(vec![1.0, 2.0, 3.0], end, TimeDelta::minutes(1));

        assert_eq!(series.timestamps.len(), 3);
        assert_eq!(series.timestamps[2], end);
        assert_eq!(series.timestamps[0], end - TimeDelta::minutes(2));
    }

    #[test]
    fn test_evenly_spaced_stops_at_min_date() {
        // Roughly 100k years per step: the fourth step back is unrepresentable
        let end = Utc::now();
        let step = TimeDelta::days(36_500_000);
        let series = MetricSeries::evenly_spaced(vec![1.0, 2.0, 3.0, 4.0, 5.0], end, step);

        assert_eq!(series.values, vec![3.0, 4.0, 5.0]);
        assert_eq!(series.timestamps.len(), 3);
        assert_eq!(series.timestamps[2], end);
        assert!(series.timestamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_series_timestamps_optional_in_json() {
        let series: MetricSeries = serde_json::from_str(r#"{"values": [1.0, 2.0]}"#).unwrap();
        assert_eq!(series.values, vec![1.0, 2.0]);
        assert!(series.timestamps.is_empty());
    }
}
