//! Host metrics from the Linux proc filesystem
//!
//! Reads:
//! - /proc/stat for aggregate CPU busy percentage
//! - /proc/meminfo for memory used percentage
//! - /proc/net/dev for network throughput (MB/s, loopback excluded)
//!
//! Each collection appends one sample per metric to a bounded window and
//! returns the whole window, so the detection pipeline sees a series rather
//! than a single point.

use super::MetricsSource;
use crate::models::{MetricBatch, MetricSample, MetricSeries};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default number of samples kept per metric
pub const DEFAULT_SAMPLE_WINDOW: usize = 60;

/// Cumulative CPU jiffies from the aggregate `cpu` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

impl CpuTimes {
    /// Busy percentage since `previous`, or since boot when there is none
    pub fn busy_percent_since(&self, previous: Option<CpuTimes>) -> f64 {
        let (busy, total) = match previous {
            Some(prev) => (
                self.busy.saturating_sub(prev.busy),
                self.total.saturating_sub(prev.total),
            ),
            None => (self.busy, self.total),
        };
        if total == 0 {
            return 0.0;
        }
        busy as f64 / total as f64 * 100.0
    }
}

/// Parse the aggregate `cpu` line of /proc/stat
///
/// Idle time is `idle + iowait`; everything else counts as busy.
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes> {
    let line = content
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))
        .context("No aggregate cpu line in /proc/stat")?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|f| f.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .context("Malformed cpu line in /proc/stat")?;

    if fields.len() < 4 {
        anyhow::bail!("cpu line has {} fields, need at least 4", fields.len());
    }

    let total: u64 = fields.iter().sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);

    Ok(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

/// Parse /proc/meminfo into a used-memory percentage
pub fn parse_meminfo(content: &str) -> Result<f64> {
    let mut total = None;
    let mut available = None;
    let mut free = 0u64;

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 2 {
            let value = parts[1].parse::<u64>().ok();
            match parts[0] {
                "MemTotal:" => total = value,
                "MemAvailable:" => available = value,
                "MemFree:" => free = value.unwrap_or(0),
                _ => {}
            }
        }
    }

    let total = total.filter(|t| *t > 0).context("MemTotal missing from /proc/meminfo")?;
    // Kernels before 3.14 have no MemAvailable
    let available = available.unwrap_or(free);

    Ok(total.saturating_sub(available) as f64 / total as f64 * 100.0)
}

/// Sum of received and transmitted bytes over all non-loopback interfaces
pub fn parse_net_dev(content: &str) -> u64 {
    content
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(iface, _)| iface.trim() != "lo")
        .filter_map(|(_, counters)| {
            let fields: Vec<&str> = counters.split_whitespace().collect();
            // rx_bytes is field 0, tx_bytes is field 8
            let rx = fields.first()?.parse::<u64>().ok()?;
            let tx = fields.get(8)?.parse::<u64>().ok()?;
            Some(rx + tx)
        })
        .sum()
}

#[derive(Debug, Default)]
struct SamplerState {
    prev_cpu: Option<CpuTimes>,
    prev_net: Option<(u64, DateTime<Utc>)>,
    windows: BTreeMap<String, VecDeque<MetricSample>>,
}

impl SamplerState {
    fn record(&mut self, metric: &str, sample: MetricSample, window: usize) {
        let samples = self.windows.entry(metric.to_string()).or_default();
        samples.push_back(sample);
        while samples.len() > window {
            samples.pop_front();
        }
    }

    fn batch(&self) -> MetricBatch {
        self.windows
            .iter()
            .map(|(metric, samples)| {
                let series = MetricSeries::new(
                    samples.iter().map(|s| s.value).collect(),
                    samples.iter().map(|s| s.timestamp).collect(),
                );
                (metric.clone(), series)
            })
            .collect()
    }
}

/// Samples host cpu, memory and network from /proc
pub struct HostMetricsSource {
    proc_root: PathBuf,
    window: usize,
    state: Mutex<SamplerState>,
}

impl HostMetricsSource {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Create a source with a custom proc root (for testing)
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            window: DEFAULT_SAMPLE_WINDOW,
            state: Mutex::new(SamplerState::default()),
        }
    }

    /// Number of samples retained per metric
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    async fn read(&self, relative: &str) -> Result<String> {
        let path = self.proc_root.join(relative);
        fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

impl Default for HostMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for HostMetricsSource {
    async fn collect_all_metrics(&self) -> Result<MetricBatch> {
        let timestamp = Utc::now();
        let cpu = parse_cpu_times(&self.read("stat").await?)?;
        let memory_percent = parse_meminfo(&self.read("meminfo").await?)?;
        let net_bytes = match self.read("net/dev").await {
            Ok(content) => Some(parse_net_dev(&content)),
            Err(e) => {
                warn!(error = %e, "Network counters unavailable");
                None
            }
        };

        let mut state = self.state.lock().await;

        let cpu_percent = cpu.busy_percent_since(state.prev_cpu);
        state.prev_cpu = Some(cpu);
        state.record("cpu", MetricSample { timestamp, value: cpu_percent }, self.window);
        state.record(
            "memory",
            MetricSample {
                timestamp,
                value: memory_percent,
            },
            self.window,
        );

        if let Some(bytes) = net_bytes {
            // Throughput needs two readings
            if let Some((prev_bytes, prev_at)) = state.prev_net {
                let elapsed = (timestamp - prev_at).num_milliseconds() as f64 / 1000.0;
                if elapsed > 0.0 {
                    let mb_per_sec = bytes.saturating_sub(prev_bytes) as f64 / elapsed / 1_000_000.0;
                    state.record(
                        "network",
                        MetricSample {
                            timestamp,
                            value: mb_per_sec,
                        },
                        self.window,
                    );
                }
            }
            state.prev_net = Some((bytes, timestamp));
        }

        debug!(
            cpu_percent,
            memory_percent,
            metrics = state.windows.len(),
            "Collected host metrics"
        );

        Ok(state.batch())
    }
}
