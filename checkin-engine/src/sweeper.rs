use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CheckInConfig;
use crate::engine::CheckInEngine;

/// Shorter intervals are raised to this.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Background task that applies due session timeouts
pub struct TimeoutSweeper;

impl TimeoutSweeper {
    /// Sweep every `sweep_interval_secs` from `config`.
    pub fn spawn_from_config(
        engine: Arc<CheckInEngine>,
        config: &CheckInConfig,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        Self::spawn(engine, config.sweep_interval(), shutdown)
    }

    /// Sweep every `interval` until `shutdown` is cancelled. The first pass
    /// runs immediately.
    pub fn spawn(
        engine: Arc<CheckInEngine>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "Timeout sweeper started");

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match engine.sweep_timeouts().await {
                    Ok(report) => debug!(
                        examined = report.examined,
                        transitioned = report.transitioned(),
                        "Sweep pass complete"
                    ),
                    Err(err) => warn!(error = %err, "Timeout sweep failed"),
                }
            }

            info!("Timeout sweeper stopped");
        })
    }
}
