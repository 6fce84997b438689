//! Detector model variants
//!
//! Three scoring strategies share one interface: `fit` on bootstrap columns
//! once at startup, then `score` a cleaned series into one raw score per point.
//!
//! Score scales: the statistical model maps |z| through `tanh(|z| / 3)` into
//! [0, 1). The fitted variants calibrate to the same range by percentile rank:
//! each raw deviation is replaced by the fraction of deviations observed on the
//! bootstrap data that are strictly smaller. All ensemble members therefore
//! emit scores in [0, 1] and their mean stays in [0, 1].

use super::preprocess::{standardize, std_dev, MIN_POINTS, STD_EPSILON};
use thiserror::Error;

/// Default reconstruction window for the autoencoder-style model
pub const AUTOENCODER_WINDOW: usize = 5;

/// Default reconstruction window for the variational-style model
pub const VARIATIONAL_WINDOW: usize = 10;

/// Failures local to a single model
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("bootstrap data is empty")]
    EmptyBootstrap,

    #[error("bootstrap column {column} has {len} points, need at least {required}")]
    ShortColumn {
        column: usize,
        len: usize,
        required: usize,
    },

    #[error("bootstrap column {column} contains non-finite values")]
    NonFinite { column: usize },

    #[error("bootstrap column {column} has zero variance")]
    ZeroVariance { column: usize },

    #[error("model has not been fitted")]
    NotFitted,
}

/// Polymorphic scoring unit held by the ensemble
#[derive(Debug, Clone)]
pub enum DetectorModel {
    /// Pure z-score model, needs no fitting
    Statistical(StatisticalModel),
    /// Reconstruction-error model (autoencoder / variational style)
    Reconstruction(ReconstructionModel),
    /// Rarity-under-reference-density model (isolation-forest style)
    Density(DensityModel),
}

impl DetectorModel {
    pub fn statistical() -> Self {
        DetectorModel::Statistical(StatisticalModel)
    }

    pub fn reconstruction(window: usize) -> Self {
        DetectorModel::Reconstruction(ReconstructionModel::new(window))
    }

    pub fn density() -> Self {
        DetectorModel::Density(DensityModel::new())
    }

    /// Variant tag used in status reports
    pub fn kind(&self) -> &'static str {
        match self {
            DetectorModel::Statistical(_) => "statistical",
            DetectorModel::Reconstruction(_) => "reconstruction",
            DetectorModel::Density(_) => "density",
        }
    }

    /// Whether the model is ready to score
    pub fn is_fitted(&self) -> bool {
        match self {
            DetectorModel::Statistical(_) => true,
            DetectorModel::Reconstruction(m) => m.reference.is_some(),
            DetectorModel::Density(m) => m.reference.is_some(),
        }
    }

    /// Fit on bootstrap columns (one series per metric)
    pub fn fit(&mut self, columns: &[Vec<f64>]) -> Result<(), ModelError> {
        match self {
            DetectorModel::Statistical(_) => Ok(()),
            DetectorModel::Reconstruction(m) => m.fit(columns),
            DetectorModel::Density(m) => m.fit(columns),
        }
    }

    /// Score a cleaned series, one raw score per point
    pub fn score(&self, series: &[f64]) -> Result<Vec<f64>, ModelError> {
        match self {
            DetectorModel::Statistical(m) => Ok(m.score(series)),
            DetectorModel::Reconstruction(m) => m.score(series),
            DetectorModel::Density(m) => m.score(series),
        }
    }
}

/// Z-score model: `tanh(|x - mean| / (std + eps) / 3)`
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticalModel;

impl StatisticalModel {
    pub fn score(&self, series: &[f64]) -> Vec<f64> {
        standardize(series)
            .into_iter()
            .map(|z| (z.abs() / 3.0).tanh())
            .collect()
    }
}

/// Reconstructs each standardized point from the mean of the preceding
/// `window` points and scores the absolute reconstruction error
#[derive(Debug, Clone)]
pub struct ReconstructionModel {
    window: usize,
    reference: Option<Reference>,
}

impl ReconstructionModel {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            reference: None,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn fit(&mut self, columns: &[Vec<f64>]) -> Result<(), ModelError> {
        let mut errors = Vec::new();
        for z in standardized_columns(columns)? {
            // The first point has nothing to reconstruct from
            errors.extend(reconstruction_errors(&z, self.window).into_iter().skip(1));
        }
        self.reference = Some(Reference::new(errors));
        Ok(())
    }

    pub fn score(&self, series: &[f64]) -> Result<Vec<f64>, ModelError> {
        let reference = self.reference.as_ref().ok_or(ModelError::NotFitted)?;
        let z = standardize(series);
        Ok(reconstruction_errors(&z, self.window)
            .into_iter()
            .map(|e| reference.rank(e))
            .collect())
    }
}

/// Scores how rare each standardized deviation is under the |z| density
/// observed on the bootstrap data
#[derive(Debug, Clone, Default)]
pub struct DensityModel {
    reference: Option<Reference>,
}

impl DensityModel {
    pub fn new() -> Self {
        Self { reference: None }
    }

    pub fn fit(&mut self, columns: &[Vec<f64>]) -> Result<(), ModelError> {
        let deviations = standardized_columns(columns)?
            .into_iter()
            .flatten()
            .map(f64::abs)
            .collect();
        self.reference = Some(Reference::new(deviations));
        Ok(())
    }

    pub fn score(&self, series: &[f64]) -> Result<Vec<f64>, ModelError> {
        let reference = self.reference.as_ref().ok_or(ModelError::NotFitted)?;
        Ok(standardize(series)
            .into_iter()
            .map(|z| reference.rank(z.abs()))
            .collect())
    }
}

/// Sorted reference sample for percentile-rank calibration
#[derive(Debug, Clone)]
struct Reference {
    sorted: Vec<f64>,
}

impl Reference {
    fn new(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        Self { sorted: values }
    }

    /// Fraction of reference values strictly below `x`
    fn rank(&self, x: f64) -> f64 {
        if self.sorted.is_empty() {
            return 0.0;
        }
        let below = self.sorted.partition_point(|r| *r < x);
        below as f64 / self.sorted.len() as f64
    }
}

/// Validate bootstrap columns and standardize each independently
fn standardized_columns(columns: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
    if columns.is_empty() {
        return Err(ModelError::EmptyBootstrap);
    }

    columns
        .iter()
        .enumerate()
        .map(|(column, values)| {
            if values.len() < MIN_POINTS {
                return Err(ModelError::ShortColumn {
                    column,
                    len: values.len(),
                    required: MIN_POINTS,
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::NonFinite { column });
            }
            if std_dev(values) <= STD_EPSILON {
                return Err(ModelError::ZeroVariance { column });
            }
            Ok(standardize(values))
        })
        .collect()
}

/// Absolute error of reconstructing each point from its predecessors
fn reconstruction_errors(z: &[f64], window: usize) -> Vec<f64> {
    (0..z.len())
        .map(|t| {
            let start = t.saturating_sub(window);
            if start == t {
                return 0.0;
            }
            let context = &z[start..t];
            let reconstructed = context.iter().sum::<f64>() / context.len() as f64;
            (z[t] - reconstructed).abs()
        })
        .collect()
}
