//! Metric and bootstrap data sources
//!
//! The orchestrator pulls one batch per cycle from a `MetricsSource` and fits
//! its models once from a `BootstrapSource`. Two implementations ship with the
//! crate:
//! - `HostMetricsSource` samples Linux `/proc` into per-metric windows
//! - `SyntheticBootstrap` generates seeded normal-pattern training data

mod bootstrap;
mod procfs;


pub use bootstrap::{SyntheticBootstrap, BOOTSTRAP_SAMPLES, BOOTSTRAP_SEED};
pub use procfs::{parse_cpu_times, parse_meminfo, parse_net_dev, CpuTimes, HostMetricsSource};

use crate::models::{BootstrapData, MetricBatch};
use anyhow::Result;

pub use async_trait::async_trait;

/// Provides the current batch of metric series
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Collect every available metric, keyed by metric name
    async fn collect_all_metrics(&self) -> Result<MetricBatch>;
}

/// Provides the initial series used to fit detector models
#[async_trait]
pub trait BootstrapSource: Send + Sync {
    async fn bootstrap_data(&self) -> Result<BootstrapData>;
}
