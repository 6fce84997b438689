//! Sentinel agent - continuous anomaly detection for host metrics
//!
//! Fits the detector ensemble on the synthetic bootstrap, then runs the
//! detection cycle on a fixed interval while serving health, metrics and
//! status endpoints.

use anyhow::{Context, Result};
use detector_lib::{
    collector::{HostMetricsSource, SyntheticBootstrap},
    dispatch::{Alerter, LoggingIncidentSink},
    health::HealthRegistry,
    observability::{DetectorMetrics, StructuredLogger},
    DetectionOrchestrator,
};
use sentinel_agent::{api, config::AgentConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting sentinel-agent");

    let config = AgentConfig::load()?;
    let thresholds = config
        .threshold_table()
        .context("Invalid threshold configuration")?;
    info!(
        instance = %config.instance,
        interval_secs = config.interval_secs,
        metrics = ?config.metrics,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    let metrics = DetectorMetrics::new();
    let logger = StructuredLogger::new(&config.instance);

    let source = Arc::new(
        HostMetricsSource::with_proc_root(&config.proc_root).with_window(config.sample_window),
    );
    let alerter =
        Arc::new(Alerter::new(config.instance.clone()).with_dedup_window(config.alert_dedup_window()));
    let bootstrap = SyntheticBootstrap::new(config.bootstrap_samples, config.bootstrap_seed);

    let mut orchestrator = DetectionOrchestrator::builder()
        .source(source)
        .alert_sink(alerter)
        .incident_sink(Arc::new(LoggingIncidentSink::new()))
        .thresholds(thresholds)
        .config(config.detector_config()?)
        .health(health_registry.clone())
        .build(&bootstrap)
        .await
        .context("Failed to initialize detector models")?;

    logger.log_startup(
        AGENT_VERSION,
        orchestrator.get_model_status().models.len(),
        &config.metrics,
    );

    let app_state = Arc::new(api::AppState::new(
        health_registry,
        metrics,
        orchestrator.subscribe(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(async move {
        orchestrator.run(shutdown_rx).await;
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    // The running cycle, if any, completes before the loop exits
    let _ = shutdown_tx.send(());
    loop_handle.await.context("Detection loop panicked")?;
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
