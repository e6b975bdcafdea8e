use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::info;

use crate::{services::session_service, state::SharedState};

/// Periodically close sessions that saw no activity for the configured timeout.
pub async fn run_sweeper(state: SharedState) {
    let period = state.config().sweep_interval;
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(period_secs = period.as_secs(), "inactivity sweeper started");

    loop {
        interval.tick().await;
        session_service::sweep_inactive(&state).await;
    }
}
