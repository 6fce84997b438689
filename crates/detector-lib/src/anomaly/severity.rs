//! Threshold-based severity classification

use crate::error::{DetectorError, Result};
use crate::models::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Warning and critical score thresholds for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Thresholds {
    /// Thresholds applied to metrics with no table entry
    pub const DEFAULT: Thresholds = Thresholds {
        warning: 0.7,
        critical: 0.9,
    };

    /// Create validated thresholds (`0 <= warning <= critical <= 1`)
    pub fn new(warning: f64, critical: f64) -> Result<Self> {
        let thresholds = Self { warning, critical };
        thresholds.validate()?;
        Ok(thresholds)
    }

    fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.warning) || !in_range(self.critical) {
            return Err(DetectorError::Config(format!(
                "thresholds must lie in [0, 1], got warning={} critical={}",
                self.warning, self.critical
            )));
        }
        if self.warning > self.critical {
            return Err(DetectorError::Config(format!(
                "warning threshold {} exceeds critical threshold {}",
                self.warning, self.critical
            )));
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-metric thresholds, immutable once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    entries: HashMap<String, Thresholds>,
}

impl ThresholdTable {
    /// Build a table, validating every entry
    pub fn new(entries: HashMap<String, Thresholds>) -> Result<Self> {
        for (metric, thresholds) in &entries {
            thresholds
                .validate()
                .map_err(|e| DetectorError::Config(format!("metric '{}': {}", metric, e)))?;
        }
        Ok(Self { entries })
    }

    /// Built-in thresholds for the standard infrastructure metrics
    pub fn default_entries() -> HashMap<String, Thresholds> {
        [
            ("cpu", 0.7, 0.9),
            ("memory", 0.75, 0.9),
            ("disk", 0.8, 0.95),
            ("network", 0.6, 0.8),
            ("response_time", 0.65, 0.85),
        ]
        .into_iter()
        .map(|(metric, warning, critical)| (metric.to_string(), Thresholds { warning, critical }))
        .collect()
    }

    /// Thresholds for a metric, falling back to `Thresholds::DEFAULT`
    pub fn get(&self, metric: &str) -> Thresholds {
        self.entries.get(metric).copied().unwrap_or_default()
    }

    /// Copy of the table with one entry replaced
    pub fn with_override(&self, metric: &str, thresholds: Thresholds) -> Result<Self> {
        let mut entries = self.entries.clone();
        entries.insert(metric.to_string(), thresholds);
        Self::new(entries)
    }

    /// Configured metric names, sorted
    pub fn metrics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            entries: Self::default_entries(),
        }
    }
}

/// Outcome of classifying one combined score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_anomaly: bool,
    pub severity: Severity,
}

/// Maps combined scores to severity tiers
#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityClassifier;

impl SeverityClassifier {
    pub fn classify(&self, score: f64, thresholds: Thresholds) -> Classification {
        let severity = if score >= thresholds.critical {
            Severity::Critical
        } else if score >= thresholds.warning {
            Severity::Warning
        } else {
            Severity::Info
        };

        Classification {
            is_anomaly: score >= thresholds.warning,
            severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_tiers() {
        let classifier = SeverityClassifier;
        let t = Thresholds::new(0.7, 0.9).unwrap();

        let info = classifier.classify(0.5, t);
        assert!(!info.is_anomaly);
        assert_eq!(info.severity, Severity::Info);

        let warning = classifier.classify(0.7, t);
        assert!(warning.is_anomaly);
        assert_eq!(warning.severity, Severity::Warning);

        let critical = classifier.classify(0.9, t);
        assert!(critical.is_anomaly);
        assert_eq!(critical.severity, Severity::Critical);
    }

    #[test]
    fn test_severity_monotonic_in_score() {
        let classifier = SeverityClassifier;
        let t = Thresholds::new(0.65, 0.85).unwrap();

        let mut previous = Severity::Info;
        for step in 0..=1000 {
            let score = step as f64 / 1000.0;
            let severity = classifier.classify(score, t).severity;
            assert!(severity >= previous, "severity dropped at score {}", score);
            previous = severity;
        }
        assert_eq!(previous, Severity::Critical);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(Thresholds::new(0.9, 0.7).is_err());
        assert!(Thresholds::new(-0.1, 0.7).is_err());
        assert!(Thresholds::new(0.5, 1.2).is_err());
        assert!(Thresholds::new(0.8, 0.8).is_ok());

        let mut entries = HashMap::new();
        entries.insert("cpu".to_string(), Thresholds { warning: 0.95, critical: 0.5 });
        let err = ThresholdTable::new(entries).unwrap_err();
        assert!(err.to_string().contains("cpu"));
    }

    #[test]
    fn test_default_table() {
        let table = ThresholdTable::default();
        assert_eq!(table.get("memory"), Thresholds { warning: 0.75, critical: 0.9 });
        assert_eq!(table.get("disk"), Thresholds { warning: 0.8, critical: 0.95 });
        assert_eq!(table.get("unknown_metric"), Thresholds::DEFAULT);
        assert_eq!(
            table.metrics(),
            vec!["cpu", "disk", "memory", "network", "response_time"]
        );
    }

    #[test]
    fn test_with_override() {
        let table = ThresholdTable::default()
            .with_override("cpu", Thresholds { warning: 0.5, critical: 0.6 })
            .unwrap();
        assert_eq!(table.get("cpu").warning, 0.5);
        assert_eq!(table.get("memory").warning, 0.75);
    }
}
