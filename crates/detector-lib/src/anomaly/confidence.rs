//! Ensemble agreement as a confidence value

use super::preprocess::variance;

/// Turns cross-model disagreement at one point into confidence
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceEstimator;

impl ConfidenceEstimator {
    /// `1 / (1 + variance(scores))`, capped at 1.0
    ///
    /// Perfect agreement yields exactly 1.0; growing disagreement lowers it
    /// towards 0 without reaching it.
    pub fn estimate(&self, scores: &[f64]) -> f64 {
        (1.0 / (1.0 + variance(scores))).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_agreement_is_exactly_one() {
        let estimator = ConfidenceEstimator;
        assert_eq!(estimator.estimate(&[0.8, 0.8, 0.8, 0.8]), 1.0);
        assert_eq!(estimator.estimate(&[0.0]), 1.0);
    }

    #[test]
    fn test_disagreement_lowers_confidence() {
        let estimator = ConfidenceEstimator;
        let close = estimator.estimate(&[0.7, 0.8, 0.75, 0.72]);
        let spread = estimator.estimate(&[0.0, 1.0, 0.2, 0.9]);
        let extreme = estimator.estimate(&[0.0, 100.0]);

        assert!(close < 1.0);
        assert!(spread < close);
        assert!(extreme < spread);
        assert!(extreme > 0.0);
    }

    #[test]
    fn test_known_variance() {
        // variance of [0, 1] is 0.25
        let confidence = ConfidenceEstimator.estimate(&[0.0, 1.0]);
        assert!((confidence - 0.8).abs() < 1e-12);
    }
}
