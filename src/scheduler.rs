//! Periodic reconciliation until shutdown.

use crate::config::Config;
use crate::engine::{Engine, PassReport};
use crate::error::Result;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Runs a pass at startup, then at a fixed rate.
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Scheduler using the configured interval, raised to the lowest TTL.
    pub fn from_config(config: &Config) -> Self {
        if let Some(ttl) = config.raised_interval_secs() {
            tracing::info!(
                configured_secs = config.check_interval_secs,
                ttl_secs = ttl,
                "Using the lowest TTL as the check interval"
            );
        }
        Self::new(config.effective_check_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run passes until `shutdown` changes or its sender is dropped.
    ///
    /// Ticks are fixed-rate while passes finish within the interval. A pass
    /// that overruns is followed immediately by the next one, and the
    /// schedule restarts from there; missed ticks are never replayed. A pass
    /// in flight when shutdown arrives is abandoned.
    pub async fn run(&self, engine: &Engine, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            domains = engine.domains().len(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        result = engine.run_pass() => log_pass(result),
                        _ = shutdown.changed() => {
                            tracing::info!("Shutdown requested, abandoning the current pass");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }
}

fn log_pass(result: Result<PassReport>) {
    match result {
        Ok(report) if report.is_success() => {
            tracing::debug!(ip = %report.external_ip, "Pass complete");
        }
        Ok(report) => {
            tracing::warn!(
                ip = %report.external_ip,
                failed = report.failures(),
                total = report.domains.len(),
                "Pass complete with failures"
            );
        }
        Err(e) => tracing::error!(error = %e, "Pass skipped"),
    }
}
