//! Per-metric detection pipeline
//!
//! Preprocessor -> ensemble -> severity -> confidence -> narration. A pure
//! function of (series, thresholds, fitted model state).

use super::confidence::ConfidenceEstimator;
use super::ensemble::{combine, scores_at, DetectorEnsemble};
use super::narrator::Narrator;
use super::preprocess::Preprocessor;
use super::severity::{SeverityClassifier, ThresholdTable};
use crate::error::{DetectorError, Result};
use crate::models::{AnomalyResult, BootstrapData, MetricSeries};
use tracing::debug;

/// Turns one metric series into anomaly results
#[derive(Debug, Clone)]
pub struct AnomalyPipeline {
    preprocessor: Preprocessor,
    ensemble: DetectorEnsemble,
    thresholds: ThresholdTable,
    classifier: SeverityClassifier,
    estimator: ConfidenceEstimator,
    narrator: Narrator,
}

impl AnomalyPipeline {
    pub fn new(
        preprocessor: Preprocessor,
        ensemble: DetectorEnsemble,
        thresholds: ThresholdTable,
    ) -> Self {
        Self {
            preprocessor,
            ensemble,
            thresholds,
            classifier: SeverityClassifier,
            estimator: ConfidenceEstimator,
            narrator: Narrator,
        }
    }

    /// Fit the ensemble; must succeed before the pipeline can score
    pub fn fit(&mut self, bootstrap: &BootstrapData) -> Result<()> {
        self.ensemble.fit(bootstrap)
    }

    pub fn ensemble(&self) -> &DetectorEnsemble {
        &self.ensemble
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Detect anomalous points in a series
    ///
    /// Series that are too short yield an empty result rather than an error.
    /// Scoring failures are returned to the caller.
    pub fn detect(&self, metric: &str, series: &MetricSeries) -> Result<Vec<AnomalyResult>> {
        let cleaned = match self.preprocessor.preprocess(&series.values) {
            Ok(cleaned) => cleaned,
            Err(DetectorError::InsufficientData { len, required }) => {
                debug!(metric = %metric, len, required, "Skipping series with insufficient data");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let votes = self.ensemble.score(&cleaned)?;
        let combined = combine(&votes, cleaned.len());
        let thresholds = self.thresholds.get(metric);

        let mut anomalies = Vec::new();
        for (i, sample) in series.samples().enumerate() {
            let score = combined[i];
            let classification = self.classifier.classify(score, thresholds);
            if !classification.is_anomaly {
                continue;
            }

            let value = cleaned[i];
            let confidence = self.estimator.estimate(&scores_at(&votes, i));

            anomalies.push(AnomalyResult {
                timestamp: sample.timestamp,
                metric_name: metric.to_string(),
                value,
                is_anomaly: true,
                anomaly_score: score,
                confidence,
                severity: classification.severity,
                description: self.narrator.describe(metric, value, score),
                recommendations: self.narrator.recommend(metric, classification.severity),
            });
        }

        Ok(anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::detector::DetectorModel;
    use crate::anomaly::ensemble::WeightedModel;
    use crate::collector::SyntheticBootstrap;
    use crate::models::Severity;
    use chrono::{Duration as TimeDelta, TimeZone, Utc};

    fn fitted_pipeline() -> AnomalyPipeline {
        let mut pipeline = AnomalyPipeline::new(
            Preprocessor::new(),
            DetectorEnsemble::standard(),
            ThresholdTable::default(),
        );
        pipeline.fit(&SyntheticBootstrap::default().generate().unwrap()).unwrap();
        pipeline
    }

    fn series(values: Vec<f64>) -> MetricSeries {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        MetricSeries::evenly_spaced(values, end, TimeDelta::seconds(30))
    }

    #[test]
    fn test_short_series_yields_nothing() {
        let pipeline = fitted_pipeline();
        for len in 0..10 {
            let mut values = vec![50.0; len];
            if len > 0 {
                values[len - 1] = 500.0;
            }
            assert!(pipeline.detect("cpu", &series(values)).unwrap().is_empty());
        }
    }

    #[test]
    fn test_cpu_spike_scenario() {
        let pipeline = fitted_pipeline();
        let mut values = vec![50.0; 9];
        values.push(95.0);

        let anomalies = pipeline.detect("cpu", &series(values)).unwrap();

        let last = anomalies.last().expect("spike should be flagged");
        assert_eq!(anomalies.len(), 1);
        assert!(last.is_anomaly);
        assert_eq!(last.value, 95.0);
        assert!(last.anomaly_score >= 0.7);
        assert!(last.description.contains("cpu"));
        assert!(last.description.contains("95.0"));
        assert!(last.confidence > 0.0 && last.confidence <= 1.0);
    }

    #[test]
    fn test_info_never_emitted() {
        let pipeline = fitted_pipeline();
        let values: Vec<f64> = (0..60).map(|i| 40.0 + ((i * 7) % 11) as f64).collect();

        let anomalies = pipeline.detect("memory", &series(values)).unwrap();
        assert!(anomalies.iter().all(|a| a.severity != Severity::Info && a.is_anomaly));
    }

    #[test]
    fn test_detection_is_deterministic() {
        let pipeline = fitted_pipeline();
        let mut values: Vec<f64> = (0..40).map(|i| 30.0 + (i % 5) as f64).collect();
        values[20] = 90.0;
        values[33] = f64::NAN;
        let input = series(values);

        let first = serde_json::to_string(&pipeline.detect("disk", &input).unwrap()).unwrap();
        let second = serde_json::to_string(&pipeline.detect("disk", &input).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unfitted_pipeline_fails_scoring() {
        let pipeline = AnomalyPipeline::new(
            Preprocessor::new(),
            DetectorEnsemble::standard(),
            ThresholdTable::default(),
        );
        let err = pipeline.detect("cpu", &series(vec![1.0; 12])).unwrap_err();
        assert!(err.is_cycle_failure());
    }

    #[test]
    fn test_perfect_agreement_gives_full_confidence() {
        // Two identical statistical members always agree
        let ensemble = DetectorEnsemble::new(vec![
            WeightedModel::new("a", 0.5, DetectorModel::statistical()),
            WeightedModel::new("b", 0.5, DetectorModel::statistical()),
        ]);
        let thresholds = ThresholdTable::default()
            .with_override("cpu", crate::anomaly::Thresholds { warning: 0.5, critical: 0.9 })
            .unwrap();
        let pipeline = AnomalyPipeline::new(Preprocessor::new(), ensemble, thresholds);

        let mut values = vec![50.0; 9];
        values.push(95.0);
        let anomalies = pipeline.detect("cpu", &series(values)).unwrap();

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].confidence, 1.0);
        assert_eq!(anomalies[0].severity, Severity::Warning);
    }

    #[test]
    fn test_missing_timestamps_pair_to_shorter() {
        let pipeline = fitted_pipeline();
        let mut values = vec![50.0; 9];
        values.push(95.0);
        let input = MetricSeries::new(values, Vec::new());

        assert!(pipeline.detect("cpu", &input).unwrap().is_empty());
    }
}
