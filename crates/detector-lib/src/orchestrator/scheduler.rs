//! Cancellable periodic driver for the detection cycle

use super::DetectionOrchestrator;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

impl DetectionOrchestrator {
    /// Run cycles on the configured interval until shutdown is signalled
    ///
    /// Shutdown is only observed between cycles: a cycle that has started
    /// runs to completion, buffer update included.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting detection loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!(cycles, "Shutting down detection loop");
                    break;
                }
                _ = ticker.tick() => {
                    // Failures are logged and counted inside the cycle
                    let _ = self.run_detection_cycle().await;
                    cycles += 1;
                }
            }
        }
    }
}
