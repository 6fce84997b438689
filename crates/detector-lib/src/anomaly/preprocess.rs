//! Series cleaning and shared descriptive statistics
//!
//! Cleaning policy: non-finite values (NaN, ±inf) are forward-filled with the
//! most recent finite value; leading non-finite values take the first finite
//! value of the series. The cleaned series always has the input's length.

use crate::error::{DetectorError, Result};

/// Minimum points needed for meaningful scoring
pub const MIN_POINTS: usize = 10;

/// Added to standard deviations before dividing
pub const STD_EPSILON: f64 = 1e-8;

/// Cleans raw metric values before scoring
#[derive(Debug, Clone)]
pub struct Preprocessor {
    min_points: usize,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self {
            min_points: MIN_POINTS,
        }
    }

    pub fn with_min_points(min_points: usize) -> Self {
        Self { min_points }
    }

    /// Clean a raw series
    ///
    /// Fails with `InsufficientData` when the series is shorter than the
    /// minimum or holds no finite value at all.
    pub fn preprocess(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() < self.min_points {
            return Err(DetectorError::InsufficientData {
                len: values.len(),
                required: self.min_points,
            });
        }

        let first_finite = values.iter().copied().find(|v| v.is_finite()).ok_or(
            DetectorError::InsufficientData {
                len: values.len(),
                required: self.min_points,
            },
        )?;

        let mut last = first_finite;
        Ok(values
            .iter()
            .map(|&v| {
                if v.is_finite() {
                    last = v;
                }
                last
            })
            .collect())
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Arithmetic mean (0 for an empty slice)
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (0 for an empty slice)
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Z-standardize a series against its own mean and deviation
///
/// Values are first divided by the largest finite magnitude so the sums stay
/// finite for any input; z is scale-free. Non-finite z comes out as 0.
pub fn standardize(values: &[f64]) -> Vec<f64> {
    let scale = values
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let scaled: Vec<f64> = if scale > 0.0 {
        values.iter().map(|v| v / scale).collect()
    } else {
        values.to_vec()
    };

    let m = mean(&scaled);
    let sd = std_dev(&scaled);
    scaled
        .iter()
        .map(|v| {
            let z = (v - m) / (sd + STD_EPSILON);
            if z.is_finite() {
                z
            } else {
                0.0
            }
        })
        .collect()
}
