//! Series file loading

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as TimeDelta, Utc};
use detector_lib::MetricSeries;
use serde::Deserialize;
use std::path::Path;

/// Spacing of synthesized timestamps
const SYNTHETIC_STEP_MINUTES: i64 = 1;

#[derive(Deserialize)]
#[serde(untagged)]
enum SeriesFile {
    Series(MetricSeries),
    Values(Vec<f64>),
}

/// Load a series file, synthesizing timestamps one minute apart ending at
/// `now` when the file has none
pub fn load_series(path: &Path, now: DateTime<Utc>) -> Result<MetricSeries> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read series file {}", path.display()))?;
    parse_series(&content, now)
        .with_context(|| format!("Failed to parse series file {}", path.display()))
}

fn parse_series(content: &str, now: DateTime<Utc>) -> Result<MetricSeries> {
    let series = match serde_json::from_str(content)? {
        SeriesFile::Series(series) => series,
        SeriesFile::Values(values) => MetricSeries::new(values, Vec::new()),
    };

    if series.timestamps.is_empty() {
        return Ok(MetricSeries::evenly_spaced(
            series.values,
            now,
            TimeDelta::minutes(SYNTHETIC_STEP_MINUTES),
        ));
    }
    Ok(series)
}
