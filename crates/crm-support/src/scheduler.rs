//! Periodic escalation driver

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::application::{EscalationSweep, SweepError, SweepOutcome};
use crate::config::SweepConfig;

/// Runs the escalation sweep on a fixed interval until cancelled
pub struct EscalationScheduler {
    sweep: Arc<EscalationSweep>,
    interval: Duration,
}

impl EscalationScheduler {
    pub fn new(sweep: Arc<EscalationSweep>, config: &SweepConfig) -> Self {
        Self { sweep, interval: config.interval() }
    }

    /// Sweep immediately, then once per interval. Ticks missed while a slow
    /// sweep runs are dropped rather than replayed.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "Escalation scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.sweep.process_escalations(&cancel).await {
                Ok(report) if report.outcome == SweepOutcome::DeadlineExceeded => {
                    info!(scanned = report.tickets_scanned, "Sweep hit its deadline; continuing next tick");
                }
                Ok(_) => {}
                Err(SweepError::AlreadyRunning) => debug!("Previous sweep still running"),
                Err(SweepError::Aborted { error, partial }) => error!(
                    error = %error,
                    scanned = partial.tickets_scanned,
                    escalated = partial.escalations,
                    "Escalation sweep aborted; retrying next tick"
                ),
                Err(e) => error!(error = %e, "Escalation sweep failed"),
            }
        }

        info!("Escalation scheduler stopped");
    }
}
