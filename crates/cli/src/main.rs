//! SRE Sentinel CLI
//!
//! Runs the detection pipeline and forecaster offline over a series file,
//! and queries a running agent for its model status.

mod client;
mod commands;
mod config;
mod input;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{detect, forecast, status};
use std::path::PathBuf;

/// SRE Sentinel CLI
#[derive(Parser)]
#[command(name = "sentinel")]
#[command(author, version, about = "CLI for the SRE Sentinel anomaly detector", long_about = None)]
pub struct Cli {
    /// Agent URL (can also be set via SENTINEL_API_URL env var or the config file)
    #[arg(long, env = "SENTINEL_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect anomalies in a series file
    Detect {
        /// Metric name (selects thresholds and narration)
        #[arg(long, short)]
        metric: String,

        /// JSON series file: {"values": [...], "timestamps": [...]} or a bare array
        #[arg(long)]
        file: PathBuf,

        /// Override the warning threshold
        #[arg(long)]
        warning: Option<f64>,

        /// Override the critical threshold
        #[arg(long)]
        critical: Option<f64>,
    },

    /// Forecast future values from a series file
    Forecast {
        /// Metric name
        #[arg(long, short)]
        metric: String,

        /// JSON series file
        #[arg(long)]
        file: PathBuf,

        /// Number of hourly steps to predict
        #[arg(long, default_value_t = 24)]
        horizon: usize,
    },

    /// Show model status from a running agent
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            metric,
            file,
            warning,
            critical,
        } => {
            detect::run_detect(&metric, &file, warning, critical, cli.format)?;
        }
        Commands::Forecast {
            metric,
            file,
            horizon,
        } => {
            forecast::run_forecast(&metric, &file, horizon, cli.format)?;
        }
        Commands::Status => {
            let api_url = config::resolve_api_url(cli.api_url)?;
            let client = client::ApiClient::new(&api_url)?;
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
