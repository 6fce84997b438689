//! Offline anomaly detection over a series file

use crate::input::load_series;
use crate::output::{
    color_confidence, color_severity, format_timestamp, print_header, print_info, print_json,
    print_success, print_table, OutputFormat,
};
use anyhow::{Context, Result};
use chrono::Utc;
use detector_lib::anomaly::{
    AnomalyPipeline, DetectorEnsemble, Preprocessor, ThresholdTable, Thresholds,
};
use detector_lib::collector::SyntheticBootstrap;
use detector_lib::AnomalyResult;
use std::path::Path;
use tabled::Tabled;

#[derive(Tabled)]
struct AnomalyRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Severity")]
    severity: String,
}

impl From<&AnomalyResult> for AnomalyRow {
    fn from(a: &AnomalyResult) -> Self {
        Self {
            time: format_timestamp(&a.timestamp),
            value: format!("{:.2}", a.value),
            score: format!("{:.3}", a.anomaly_score),
            confidence: color_confidence(a.confidence),
            severity: color_severity(a.severity),
        }
    }
}

/// Thresholds for `metric`, with either tier optionally overridden
pub fn resolve_thresholds(
    metric: &str,
    warning: Option<f64>,
    critical: Option<f64>,
) -> Result<ThresholdTable> {
    let table = ThresholdTable::default();
    if warning.is_none() && critical.is_none() {
        return Ok(table);
    }

    let base = table.get(metric);
    let thresholds = Thresholds::new(
        warning.unwrap_or(base.warning),
        critical.unwrap_or(base.critical),
    )
    .context("Invalid threshold override")?;
    Ok(table.with_override(metric, thresholds)?)
}

/// Detect anomalies in a series file with a freshly fitted ensemble
pub fn run_detect(
    metric: &str,
    file: &Path,
    warning: Option<f64>,
    critical: Option<f64>,
    format: OutputFormat,
) -> Result<()> {
    let series = load_series(file, Utc::now())?;
    let thresholds = resolve_thresholds(metric, warning, critical)?;

    let bootstrap = SyntheticBootstrap::default()
        .generate()
        .context("Failed to generate bootstrap data")?;
    let mut pipeline = AnomalyPipeline::new(
        Preprocessor::default(),
        DetectorEnsemble::standard(),
        thresholds,
    );
    pipeline.fit(&bootstrap).context("Failed to fit detector models")?;

    let anomalies = pipeline
        .detect(metric, &series)
        .context("Anomaly detection failed")?;

    match format {
        OutputFormat::Json => print_json(&anomalies)?,
        OutputFormat::Table => {
            if anomalies.is_empty() {
                print_success(&format!(
                    "No anomalies detected in {} points of {}",
                    series.len(),
                    metric
                ));
                return Ok(());
            }

            print_header(&format!("Anomalies in {} ({} points)", metric, series.len()));
            let rows: Vec<AnomalyRow> = anomalies.iter().map(AnomalyRow::from).collect();
            print_table(&rows);

            for anomaly in &anomalies {
                println!();
                print_info(&anomaly.description);
                for recommendation in &anomaly.recommendations {
                    println!("  - {}", recommendation);
                }
            }
        }
    }

    Ok(())
}
