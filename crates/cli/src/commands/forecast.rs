//! Offline forecasting over a series file

use crate::input::load_series;
use crate::output::{
    format_timestamp, print_header, print_json, print_table, print_warning, OutputFormat,
};
use anyhow::{Context, Result};
use chrono::Utc;
use detector_lib::predictor::{ForecastEngine, RollingBuffer};
use detector_lib::{DetectorError, ModelPrediction};
use std::path::Path;
use tabled::Tabled;

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Predicted")]
    predicted: String,
    #[tabled(rename = "Interval")]
    interval: String,
    #[tabled(rename = "Score")]
    score: String,
}

/// Forecast `horizon` hourly steps from the values in a series file
pub fn run_forecast(metric: &str, file: &Path, horizon: usize, format: OutputFormat) -> Result<()> {
    let series = load_series(file, Utc::now())?;

    let mut buffer = RollingBuffer::new(series.len());
    buffer.extend(series.values.iter().copied());

    let engine = ForecastEngine::default();
    let predictions = match engine.forecast(&buffer, horizon, Utc::now()) {
        Ok(predictions) => predictions,
        Err(DetectorError::ForecastUnavailable { len, required }) => {
            match format {
                OutputFormat::Json => print_json(&Vec::<ModelPrediction>::new())?,
                OutputFormat::Table => print_warning(&format!(
                    "Not enough history to forecast {}: {} points, need {}",
                    metric, len, required
                )),
            }
            return Ok(());
        }
        Err(e) => return Err(e).context("Forecast failed"),
    };

    match format {
        OutputFormat::Json => print_json(&predictions)?,
        OutputFormat::Table => {
            print_header(&format!("Forecast for {} ({} steps)", metric, horizon));
            let rows: Vec<PredictionRow> = predictions
                .iter()
                .map(|p| PredictionRow {
                    time: format_timestamp(&p.timestamp),
                    predicted: format!("{:.2}", p.predicted_value),
                    interval: format!(
                        "[{:.2}, {:.2}]",
                        p.confidence_interval[0], p.confidence_interval[1]
                    ),
                    score: format!("{:.3}", p.anomaly_score),
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}
