//! Dynamic duel payoffs derived from a rolling window of recent choices.

use std::collections::VecDeque;

use crate::state::games::matchmaker::Choice;

/// Reward for each player when both cooperate, before adjustment.
const BASE_BOTH_COOPERATE: u32 = 3;
/// Reward for the defector when the other player cooperated, before adjustment.
const BASE_MIXED: u32 = 5;
/// Sips each player drinks when both defect, before adjustment.
const BASE_BOTH_DEFECT: u32 = 2;
/// Adjustment applied when every recorded choice was a defection.
const MAX_ADJUSTMENT: f64 = 2.0;

/// The two choices made in one finished duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundChoices {
    /// Choice of the first duelist.
    pub choice_a: Choice,
    /// Choice of the second duelist.
    pub choice_b: Choice,
}

impl RoundChoices {
    fn defections(&self) -> usize {
        [self.choice_a, self.choice_b]
            .into_iter()
            .filter(|choice| *choice == Choice::Defect)
            .count()
    }
}

/// Payoff magnitudes in effect for the next duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Penalties {
    /// Points each player earns when both cooperate.
    pub both_cooperate: u32,
    /// Points the defector earns against a cooperator.
    pub mixed: u32,
    /// Sips each player drinks when both defect.
    pub both_defect: u32,
}

/// Compute payoffs from a window of rounds.
///
/// The fraction of defecting choices (two per round) scales [`MAX_ADJUSTMENT`], which is
/// added to the cooperation reward and the mutual-defection penalty and subtracted from
/// the defector's reward. Order inside the window does not matter.
pub fn penalties<'a, I>(history: I) -> Penalties
where
    I: IntoIterator<Item = &'a RoundChoices>,
{
    let (rounds, defections) = history
        .into_iter()
        .fold((0usize, 0usize), |(rounds, defections), round| {
            (rounds + 1, defections + round.defections())
        });

    let adjustment = if rounds == 0 {
        0
    } else {
        let fraction = defections as f64 / (rounds * 2) as f64;
        (fraction * MAX_ADJUSTMENT).round() as u32
    };

    Penalties {
        both_cooperate: BASE_BOTH_COOPERATE + adjustment,
        mixed: BASE_MIXED.saturating_sub(adjustment),
        both_defect: BASE_BOTH_DEFECT + adjustment,
    }
}

/// Bounded FIFO of recent rounds.
#[derive(Debug, Clone)]
pub struct PenaltyWindow {
    rounds: VecDeque<RoundChoices>,
    capacity: usize,
}

impl PenaltyWindow {
    /// Create an empty window keeping at most `capacity` rounds.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rounds: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a finished round, evicting the oldest one when full.
    pub fn record(&mut self, round: RoundChoices) {
        if self.rounds.len() == self.capacity {
            self.rounds.pop_front();
        }
        self.rounds.push_back(round);
    }

    /// Payoffs for the current window contents.
    pub fn penalties(&self) -> Penalties {
        penalties(&self.rounds)
    }

    /// Number of rounds currently held.
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    /// Whether no round has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}
