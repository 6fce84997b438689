//! Ensemble of detector models
//!
//! Every member scores the same cleaned series; the combined anomaly score at
//! each index is the unweighted mean of the members' scores. Member weights
//! are carried through to votes and status reports but do not enter the
//! combination.

use super::detector::{DetectorModel, AUTOENCODER_WINDOW, VARIATIONAL_WINDOW};
use crate::error::{DetectorError, Result};
use crate::models::{BootstrapData, ModelActivity, ModelState};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A named, weighted ensemble member
#[derive(Debug, Clone)]
pub struct WeightedModel {
    pub name: String,
    pub weight: f64,
    pub model: DetectorModel,
}

impl WeightedModel {
    pub fn new(name: impl Into<String>, weight: f64, model: DetectorModel) -> Self {
        Self {
            name: name.into(),
            weight: weight.clamp(0.0, 1.0),
            model,
        }
    }
}

/// One member's scores for a single detection call
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleVote {
    pub model_name: String,
    pub raw_scores: Vec<f64>,
    pub weight: f64,
}

/// Fixed set of detector models, built once at startup
#[derive(Debug, Clone)]
pub struct DetectorEnsemble {
    models: Vec<WeightedModel>,
}

impl DetectorEnsemble {
    pub fn new(models: Vec<WeightedModel>) -> Self {
        Self { models }
    }

    /// The default four-member ensemble
    pub fn standard() -> Self {
        Self::new(vec![
            WeightedModel::new("isolation_forest", 0.3, DetectorModel::density()),
            WeightedModel::new(
                "autoencoder",
                0.3,
                DetectorModel::reconstruction(AUTOENCODER_WINDOW),
            ),
            WeightedModel::new("vae", 0.2, DetectorModel::reconstruction(VARIATIONAL_WINDOW)),
            WeightedModel::new("statistical", 0.2, DetectorModel::statistical()),
        ])
    }

    pub fn models(&self) -> &[WeightedModel] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Fit every member on the bootstrap series
    ///
    /// Any member failing to fit is fatal for initialization.
    pub fn fit(&mut self, bootstrap: &BootstrapData) -> Result<()> {
        let columns: Vec<Vec<f64>> = bootstrap.values().cloned().collect();

        for member in &mut self.models {
            member
                .model
                .fit(&columns)
                .map_err(|e| DetectorError::ModelInitialization {
                    model: member.name.clone(),
                    reason: e.to_string(),
                })?;
            debug!(model = %member.name, kind = member.model.kind(), "Model fitted");
        }

        info!(
            models = self.models.len(),
            bootstrap_series = columns.len(),
            "Detector ensemble fitted"
        );
        Ok(())
    }

    /// Run every member over a cleaned series
    pub fn score(&self, series: &[f64]) -> Result<Vec<EnsembleVote>> {
        self.models
            .iter()
            .map(|member| {
                let raw_scores =
                    member
                        .model
                        .score(series)
                        .map_err(|e| DetectorError::Scoring {
                            model: member.name.clone(),
                            reason: e.to_string(),
                        })?;

                if raw_scores.len() != series.len() {
                    return Err(DetectorError::Scoring {
                        model: member.name.clone(),
                        reason: format!(
                            "produced {} scores for {} points",
                            raw_scores.len(),
                            series.len()
                        ),
                    });
                }

                Ok(EnsembleVote {
                    model_name: member.name.clone(),
                    raw_scores,
                    weight: member.weight,
                })
            })
            .collect()
    }

    /// Status of every member keyed by name
    pub fn status(&self) -> BTreeMap<String, ModelState> {
        self.models
            .iter()
            .map(|member| {
                let status = if member.model.is_fitted() {
                    ModelActivity::Active
                } else {
                    ModelActivity::Inactive
                };
                (
                    member.name.clone(),
                    ModelState {
                        status,
                        kind: member.model.kind().to_string(),
                        weight: member.weight,
                    },
                )
            })
            .collect()
    }
}

impl Default for DetectorEnsemble {
    fn default() -> Self {
        Self::standard()
    }
}

/// Unweighted per-index mean of all votes
pub fn combine(votes: &[EnsembleVote], len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            if votes.is_empty() {
                return 0.0;
            }
            votes.iter().map(|v| v.raw_scores[i]).sum::<f64>() / votes.len() as f64
        })
        .collect()
}

/// Every member's score at one index
pub fn scores_at(votes: &[EnsembleVote], index: usize) -> Vec<f64> {
    votes.iter().map(|v| v.raw_scores[index]).collect()
}
