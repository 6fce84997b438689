//! Ensemble anomaly scoring
//!
//! This module provides:
//! - Series cleaning (`Preprocessor`)
//! - Detector model variants and the ensemble that combines them
//! - Severity classification, confidence estimation and narration
//! - `AnomalyPipeline`, which chains all of the above per metric

mod confidence;
mod detector;
mod ensemble;
mod narrator;
mod pipeline;
mod preprocess;
mod severity;

pub use confidence::ConfidenceEstimator;
pub use detector::{
    DensityModel, DetectorModel, ModelError, ReconstructionModel, StatisticalModel,
    AUTOENCODER_WINDOW, VARIATIONAL_WINDOW,
};
pub use ensemble::{combine, scores_at, DetectorEnsemble, EnsembleVote, WeightedModel};
pub use narrator::{Narrator, URGENT_MARKER};
pub use pipeline::AnomalyPipeline;
pub use preprocess::{mean, standardize, std_dev, variance, Preprocessor, MIN_POINTS, STD_EPSILON};
pub use severity::{Classification, SeverityClassifier, ThresholdTable, Thresholds};
