//! Background sweeper task.
//!
//! Runs the engine's maintenance pass on a fixed interval until shut
//! down. Sweep failures are logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shiftgate_core::estimator::{Predictor, Trainer};
use shiftgate_core::repository::{AuditRepository, QuotaRepository, SessionRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::GovernanceEngine;

/// Handle for stopping a running sweeper.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the background sweeper for `engine`, ticking every
/// `interval`.
pub fn spawn<S, Q, A, T, P>(
    engine: Arc<GovernanceEngine<S, Q, A, T, P>>,
    interval: Duration,
) -> SweeperHandle
where
    S: SessionRepository + 'static,
    Q: QuotaRepository + 'static,
    A: AuditRepository + 'static,
    T: Trainer + 'static,
    P: Predictor + 'static,
{
    let (tx, mut rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh start
        // does not race application setup.
        ticker.tick().await;

        info!(interval_secs = interval.as_secs(), "sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match engine.sweep(Utc::now()).await {
                        Ok(report) => {
                            if report.sessions_removed > 0 || report.bans_lifted > 0 {
                                info!(
                                    sessions_removed = report.sessions_removed,
                                    bans_lifted = report.bans_lifted,
                                    "sweep completed"
                                );
                            } else {
                                debug!("sweep completed, nothing to do");
                            }
                        }
                        Err(e) => warn!(error = %e, "sweep failed"),
                    }
                }
                _ = rx.changed() => {
                    info!("sweeper shutting down");
                    break;
                }
            }
        }
    });

    SweeperHandle { shutdown: tx, task }
}
