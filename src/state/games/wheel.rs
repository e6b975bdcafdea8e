//! Penalty wheel: the host spins, a target, a severity and a category are drawn.

use tracing::info;

use crate::{
    dto::{
        game::{GameSnapshot, WheelAction, WheelOutcomeView, WheelSnapshot},
        ws::ServerMessage,
    },
    error::ServiceError,
    state::{
        games::{
            matchmaker::is_eligible,
            selector::{select, select_uniform},
        },
        phase::{GameContext, GameMachine, Step, TimerRequest},
        session::{GameType, Player, PlayerId},
    },
};

/// Categories printed on the wheel.
const CATEGORIES: [&str; 6] = ["truth", "dare", "trivia", "challenge", "waterfall", "new rule"];

/// Phases of the wheel game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WheelPhase {
    /// Waiting for the host to spin.
    #[default]
    Ready,
    /// Wheel is turning.
    Spinning,
    /// Outcome on screen until the host moves on.
    Result,
}

impl WheelPhase {
    /// Client-facing phase name.
    pub fn name(self) -> &'static str {
        match self {
            WheelPhase::Ready => "ready",
            WheelPhase::Spinning => "spinning",
            WheelPhase::Result => "result",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WheelOutcome {
    target_id: PlayerId,
    target_name: String,
    severity: String,
    category: String,
}

#[derive(Debug)]
enum WheelPlan {
    Spin(WheelOutcome),
    Reset,
}

/// Wheel game state.
#[derive(Debug, Default)]
pub struct WheelGame {
    phase: WheelPhase,
    spins: u32,
    /// Drawn when the spin starts, hidden until it stops.
    pending: Option<WheelOutcome>,
    last: Option<WheelOutcome>,
}

impl WheelGame {
    /// Fresh wheel, ready to spin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> WheelPhase {
        self.phase
    }

    fn draw(ctx: &mut GameContext<'_>) -> Result<WheelOutcome, ServiceError> {
        let targets: Vec<&Player> = ctx.players.iter().filter(|p| is_eligible(p)).collect();
        let target = select_uniform(&targets, ctx.rng)
            .ok_or_else(|| ServiceError::InvalidPhase("no connected player to spin for".into()))?;
        let severity = select(&ctx.config.wheel_severities, ctx.rng)
            .cloned()
            .ok_or_else(|| ServiceError::InvalidPhase("severity table is empty".into()))?;
        let category = select_uniform(&CATEGORIES, ctx.rng)
            .copied()
            .unwrap_or(CATEGORIES[0]);

        Ok(WheelOutcome {
            target_id: target.id,
            target_name: target.display_name.clone(),
            severity,
            category: category.to_string(),
        })
    }

    fn plan(
        &self,
        ctx: &mut GameContext<'_>,
        action: WheelAction,
    ) -> Result<WheelPlan, ServiceError> {
        match (self.phase, action) {
            (WheelPhase::Ready | WheelPhase::Result, WheelAction::Spin) => {
                Self::draw(ctx).map(WheelPlan::Spin)
            }
            (WheelPhase::Result, WheelAction::Next) => Ok(WheelPlan::Reset),
            (phase, action) => Err(ServiceError::InvalidPhase(format!(
                "{} is not allowed during {}",
                action.name(),
                phase.name()
            ))),
        }
    }
}

impl GameMachine for WheelGame {
    type Action = WheelAction;

    fn game_type(&self) -> GameType {
        GameType::Wheel
    }

    fn phase_name(&self) -> &'static str {
        self.phase.name()
    }

    fn is_host_only(_action: &WheelAction) -> bool {
        true
    }

    fn handle(
        &mut self,
        ctx: &mut GameContext<'_>,
        _actor: PlayerId,
        action: WheelAction,
    ) -> Result<Step, ServiceError> {
        let step = match self.plan(ctx, action)? {
            WheelPlan::Spin(outcome) => {
                self.pending = Some(outcome);
                self.phase = WheelPhase::Spinning;
                Step::enter(TimerRequest::Arm(ctx.ticks(ctx.config.wheel_spin_secs)))
            }
            WheelPlan::Reset => {
                self.last = None;
                self.phase = WheelPhase::Ready;
                Step::changed()
            }
        };
        Ok(step.with_reply(ServerMessage::ActionAccepted))
    }

    fn on_expire(&mut self, _ctx: &mut GameContext<'_>) -> Step {
        if self.phase != WheelPhase::Spinning {
            return Step::none();
        }
        self.spins += 1;
        self.last = self.pending.take();
        self.phase = WheelPhase::Result;
        if let Some(outcome) = &self.last {
            info!(
                spins = self.spins,
                severity = %outcome.severity,
                category = %outcome.category,
                "wheel stopped"
            );
        }
        Step::changed()
    }

    fn on_player_reattached(&mut self, old: PlayerId, new: PlayerId) {
        for outcome in self.pending.iter_mut().chain(self.last.iter_mut()) {
            if outcome.target_id == old {
                outcome.target_id = new;
            }
        }
    }

    fn snapshot(&self) -> GameSnapshot {
        let outcome = match self.phase {
            WheelPhase::Spinning => None,
            _ => self.last.as_ref().map(|outcome| WheelOutcomeView {
                target_id: outcome.target_id,
                target_name: outcome.target_name.clone(),
                severity: outcome.severity.clone(),
                category: outcome.category.clone(),
            }),
        };
        GameSnapshot::Wheel(WheelSnapshot {
            spins: self.spins,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::games::testing::Table;

    fn outcome(game: &WheelGame) -> Option<WheelOutcomeView> {
        match game.snapshot() {
            GameSnapshot::Wheel(snapshot) => snapshot.outcome,
            other => panic!("unexpected snapshot {other:?}"),
        }
    }

    #[test]
    fn spin_hides_outcome_until_the_timer_expires() {
        let mut table = Table::with_players(&["Alice", "Bob", "Carol"]);
        let host = table.host();
        let mut game = WheelGame::new();

        let step = game
            .handle(&mut table.ctx(), host, WheelAction::Spin)
            .unwrap();
        assert_eq!(game.phase(), WheelPhase::Spinning);
        assert_eq!(step.timer, TimerRequest::Arm(4));
        assert!(outcome(&game).is_none());

        game.on_expire(&mut table.ctx());
        assert_eq!(game.phase(), WheelPhase::Result);
        let shown = outcome(&game).unwrap();
        assert!(table.players.iter().any(|p| p.id == shown.target_id));
        assert!(
            table
                .config
                .wheel_severities
                .iter()
                .any(|row| row.outcome == shown.severity)
        );
        assert!(CATEGORIES.contains(&shown.category.as_str()));
    }

    #[test]
    fn disconnected_players_are_never_targeted() {
        let mut table = Table::with_players(&["Alice", "Bob"]);
        table.players[1].disconnected = true;
        let host = table.host();
        let mut game = WheelGame::new();
        for _ in 0..20 {
            game.handle(&mut table.ctx(), host, WheelAction::Spin)
                .unwrap();
            game.on_expire(&mut table.ctx());
            assert_eq!(outcome(&game).unwrap().target_id, host);
        }
    }

    #[test]
    fn next_requires_a_result() {
        let mut table = Table::with_players(&["Alice"]);
        let host = table.host();
        let mut game = WheelGame::new();
        let err = game
            .handle(&mut table.ctx(), host, WheelAction::Next)
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPhase(_)));

        game.handle(&mut table.ctx(), host, WheelAction::Spin)
            .unwrap();
        let err = game
            .handle(&mut table.ctx(), host, WheelAction::Spin)
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPhase(_)));
    }
}
