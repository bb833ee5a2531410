use axum::extract::ws::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::{Registry, Visit};
use crate::state::AppState;

/// Outcome of one probe sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub sent: usize,
    pub failed: usize,
}

/// Queue a ping for every registered connection.
///
/// Failures are only logged. A peer that cannot take a ping is left in place;
/// its read deadline evicts it if it is really gone.
pub async fn probe_all(registry: &Registry) -> ProbeReport {
    let mut report = ProbeReport::default();

    registry
        .sweep(|conn| {
            match conn.try_send(Message::Ping(Default::default())) {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("Failed to ping {} ({}): {}", conn.name(), conn.id(), e);
                }
            }
            Visit::Keep
        })
        .await;

    report
}

/// Spawn the process-wide liveness monitor
pub fn spawn_liveness_monitor(state: Arc<AppState>) -> JoinHandle<()> {
    let period = state.config.ping_interval;
    tokio::spawn(run_liveness_monitor(state.registry.clone(), period))
}

async fn run_liveness_monitor(registry: Registry, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the first immediate tick; fresh connections already have a full deadline
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let report = probe_all(&registry).await;
        tracing::trace!("Ping sweep: {} sent, {} failed", report.sent, report.failed);
    }
}
