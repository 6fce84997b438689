//! Seeded synthetic bootstrap data
//!
//! Normal-pattern training series:
//! - cpu ~ N(50, 15)
//! - memory = 0.8 * cpu + N(0, 10)
//! - disk ~ N(30, 10)
//! - network ~ Exp(mean 20)

use super::BootstrapSource;
use crate::models::BootstrapData;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp, Normal};

/// Samples generated per metric
pub const BOOTSTRAP_SAMPLES: usize = 1000;

/// Fixed seed so every startup fits identical models
pub const BOOTSTRAP_SEED: u64 = 42;

/// Generates the synthetic bootstrap series
#[derive(Debug, Clone, Copy)]
pub struct SyntheticBootstrap {
    pub samples: usize,
    pub seed: u64,
}

impl SyntheticBootstrap {
    pub fn new(samples: usize, seed: u64) -> Self {
        Self { samples, seed }
    }

    /// Generate one series per metric
    pub fn generate(&self) -> Result<BootstrapData> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let cpu_dist = Normal::new(50.0, 15.0).map_err(|e| anyhow!("cpu distribution: {e}"))?;
        let noise = Normal::new(0.0, 10.0).map_err(|e| anyhow!("memory noise: {e}"))?;
        let disk_dist = Normal::new(30.0, 10.0).map_err(|e| anyhow!("disk distribution: {e}"))?;
        let network_dist = Exp::new(1.0 / 20.0).map_err(|e| anyhow!("network distribution: {e}"))?;

        let cpu: Vec<f64> = (0..self.samples).map(|_| cpu_dist.sample(&mut rng)).collect();
        let memory: Vec<f64> = cpu.iter().map(|c| 0.8 * c + noise.sample(&mut rng)).collect();
        let disk: Vec<f64> = (0..self.samples).map(|_| disk_dist.sample(&mut rng)).collect();
        let network: Vec<f64> = (0..self.samples)
            .map(|_| network_dist.sample(&mut rng))
            .collect();

        let mut data = BootstrapData::new();
        data.insert("cpu".to_string(), cpu);
        data.insert("memory".to_string(), memory);
        data.insert("disk".to_string(), disk);
        data.insert("network".to_string(), network);
        Ok(data)
    }
}

impl Default for SyntheticBootstrap {
    fn default() -> Self {
        Self::new(BOOTSTRAP_SAMPLES, BOOTSTRAP_SEED)
    }
}

#[async_trait]
impl BootstrapSource for SyntheticBootstrap {
    async fn bootstrap_data(&self) -> Result<BootstrapData> {
        self.generate()
    }
}
