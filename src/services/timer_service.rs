//! Ticker tasks feeding armed countdowns back into the registry.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use crate::{
    services::session_service,
    state::{
        ArmedTicker, SharedState,
        timer::{TickOutcome, TimerId, TimerKey},
    },
};

/// Spawn the ticker for a freshly armed timer, replacing any ticker on the same key.
///
/// Must be called while holding the registry lock so the first tick cannot race the
/// installation of the handle.
pub fn start_ticker(state: &SharedState, key: TimerKey, id: TimerId) {
    let period = state.config().tick_interval;
    let task = tokio::spawn(run_ticker(state.clone(), key.clone(), id, period));
    state.install_ticker(
        key,
        ArmedTicker {
            id,
            task: task.abort_handle(),
        },
    );
}

async fn run_ticker(state: SharedState, key: TimerKey, id: TimerId, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let outcome = {
            let mut registry = state.registry().lock().await;
            let (outcome, outbox) = registry.timer_tick(&key, id);
            session_service::apply(&state, outbox);
            outcome
        };
        match outcome {
            TickOutcome::Ticked { .. } => continue,
            TickOutcome::Expired { phase } => {
                debug!(code = %key.code, slot = ?key.slot, phase, "ticker finished");
                break;
            }
            TickOutcome::Stale => {
                debug!(code = %key.code, slot = ?key.slot, id, "stale ticker stopped");
                break;
            }
        }
    }
    state.release_ticker(&key, id);
}
