//! Tick-driven countdowns keyed by session.
//!
//! The table only holds bookkeeping; the runtime spawns one ticker task per armed key and
//! reports each tick back with the [`TimerId`] it was started for. A tick whose id no
//! longer matches the armed handle is stale and ignored.

use std::collections::HashMap;

use crate::state::session::SessionCode;

/// Which countdown of a session a timer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    /// The single game countdown.
    Game,
    /// Grace window of a disconnected host.
    HostGrace,
}

/// Key of a countdown: one live handle per (session, slot).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    /// Owning session.
    pub code: SessionCode,
    /// Which countdown of the session.
    pub slot: TimerSlot,
}

impl TimerKey {
    /// Key of the game countdown of `code`.
    pub fn game(code: &SessionCode) -> Self {
        Self {
            code: code.clone(),
            slot: TimerSlot::Game,
        }
    }

    /// Key of the host grace countdown of `code`.
    pub fn host_grace(code: &SessionCode) -> Self {
        Self {
            code: code.clone(),
            slot: TimerSlot::HostGrace,
        }
    }
}

/// Monotonic identifier distinguishing successive arms of the same key.
pub type TimerId = u64;

/// Live countdown bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerHandle {
    /// Arm identifier; stale ticks carry an older one.
    pub id: TimerId,
    /// Ticks left.
    pub remaining: u32,
    /// Ticks the countdown was armed with.
    pub duration: u32,
    /// Phase the owner was in when the timer was armed.
    pub phase: &'static str,
}

/// Result of delivering one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown moved on and is still armed.
    Ticked {
        /// Ticks left.
        remaining: u32,
        /// Ticks the countdown was armed with.
        duration: u32,
    },
    /// The countdown reached zero and has been disarmed.
    Expired {
        /// Phase recorded when the countdown was armed.
        phase: &'static str,
    },
    /// The tick belongs to a timer that was cancelled or replaced.
    Stale,
}

/// At most one armed countdown per key.
#[derive(Debug, Default)]
pub struct TimerTable {
    handles: HashMap<TimerKey, TimerHandle>,
    next_id: TimerId,
}

impl TimerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a countdown of `ticks`, replacing whatever was armed for `key`.
    pub fn arm(&mut self, key: TimerKey, ticks: u32, phase: &'static str) -> TimerId {
        self.next_id += 1;
        let id = self.next_id;
        let ticks = ticks.max(1);
        self.handles.insert(
            key,
            TimerHandle {
                id,
                remaining: ticks,
                duration: ticks,
                phase,
            },
        );
        id
    }

    /// Disarm `key`; returns whether something was armed.
    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        self.handles.remove(key).is_some()
    }

    /// Current handle for `key`.
    pub fn get(&self, key: &TimerKey) -> Option<&TimerHandle> {
        self.handles.get(key)
    }

    /// Whether anything is armed for `key`.
    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.handles.contains_key(key)
    }

    /// Apply one tick to `key` if `id` is still the armed timer.
    pub fn tick(&mut self, key: &TimerKey, id: TimerId) -> TickOutcome {
        let Some(handle) = self.handles.get_mut(key) else {
            return TickOutcome::Stale;
        };
        if handle.id != id {
            return TickOutcome::Stale;
        }

        handle.remaining = handle.remaining.saturating_sub(1);
        if handle.remaining > 0 {
            return TickOutcome::Ticked {
                remaining: handle.remaining,
                duration: handle.duration,
            };
        }

        let phase = handle.phase;
        self.handles.remove(key);
        TickOutcome::Expired { phase }
    }

    /// Disarm every timer of a session.
    pub fn cancel_session(&mut self, code: &SessionCode) -> Vec<TimerKey> {
        let keys: Vec<TimerKey> = self
            .handles
            .keys()
            .filter(|key| &key.code == code)
            .cloned()
            .collect();
        for key in &keys {
            self.handles.remove(key);
        }
        keys
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> TimerKey {
        TimerKey::game(&SessionCode::parse("ABCDE"))
    }

    #[test]
    fn expires_exactly_once() {
        let mut table = TimerTable::new();
        let id = table.arm(key(), 2, "collecting");

        assert_eq!(
            table.tick(&key(), id),
            TickOutcome::Ticked {
                remaining: 1,
                duration: 2
            }
        );
        assert_eq!(
            table.tick(&key(), id),
            TickOutcome::Expired {
                phase: "collecting"
            }
        );
        assert_eq!(table.tick(&key(), id), TickOutcome::Stale);
        assert!(table.is_empty());
    }

    #[test]
    fn rearming_makes_previous_ticks_stale() {
        let mut table = TimerTable::new();
        let first = table.arm(key(), 1, "countdown");
        let second = table.arm(key(), 1, "negotiation");

        assert_eq!(table.len(), 1);
        assert_eq!(table.tick(&key(), first), TickOutcome::Stale);
        assert_eq!(
            table.tick(&key(), second),
            TickOutcome::Expired {
                phase: "negotiation"
            }
        );
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut table = TimerTable::new();
        let id = table.arm(key(), 3, "decision");
        assert!(table.cancel(&key()));
        assert!(!table.cancel(&key()));
        assert_eq!(table.tick(&key(), id), TickOutcome::Stale);
    }

    #[test]
    fn cancel_session_clears_every_slot() {
        let mut table = TimerTable::new();
        let code = SessionCode::parse("ABCDE");
        table.arm(TimerKey::game(&code), 3, "decision");
        table.arm(TimerKey::host_grace(&code), 30, "grace");
        table.arm(TimerKey::game(&SessionCode::parse("ZZZZZ")), 3, "decision");

        assert_eq!(table.cancel_session(&code).len(), 2);
        assert_eq!(table.len(), 1);
    }
}
