use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod game;
/// Health check payloads.
pub mod health;
/// Track search payloads.
pub mod search;
/// Session and player snapshots.
pub mod session;
pub mod validation;
/// WebSocket message envelopes.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
