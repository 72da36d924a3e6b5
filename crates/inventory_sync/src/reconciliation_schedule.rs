use inventory_domain::{DomainError, ReconciliationScanner};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Scheduled trigger for reconciliation passes.
/// The first pass starts immediately; a failed pass is retried on the next tick.
pub struct ReconciliationSchedule {
    scanner: Arc<ReconciliationScanner>,
    interval: Duration,
}

impl ReconciliationSchedule {
    pub fn new(scanner: Arc<ReconciliationScanner>, interval: Duration) -> Self {
        Self { scanner, interval }
    }

    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            mode = ?self.scanner.mode(),
            "Starting reconciliation schedule"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping reconciliation schedule");
                    break;
                }
                _ = ticker.tick() => {
                    match self.scanner.run(&ctx.child_token()).await {
                        Ok(summary) => debug!(?summary, "Scheduled reconciliation finished"),
                        Err(DomainError::Cancelled) => {
                            info!("Reconciliation interrupted by shutdown");
                            break;
                        }
                        // Already logged by the scanner; the next tick is the retry
                        Err(_) => {}
                    }
                }
            }
        }

        Ok(())
    }
}
