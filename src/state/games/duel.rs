//! Two-player social dilemma: countdown, negotiation, secret decision, reveal, repeat.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::{
    dto::{
        game::{
            DuelAction, DuelResultView, DuelSnapshot, DuelistsView, GameSnapshot, PayoffsView,
            StandingView,
        },
        ws::ServerMessage,
    },
    error::ServiceError,
    state::{
        games::{
            matchmaker::{self, Choice, DuelOutcome, Pairing},
            penalty::{Penalties, PenaltyWindow, RoundChoices},
        },
        phase::{GameContext, GameMachine, Step, TimerRequest},
        session::{GameType, PlayerId},
    },
};

/// Choice recorded for a duelist who let the decision timer run out.
const DEFAULT_CHOICE: Choice = Choice::Defect;

/// Phases of the duel game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelPhase {
    /// Fewer than two eligible players; nothing is running.
    Waiting,
    /// Short pause before the duelists talk.
    Countdown,
    /// Duelists exchange messages.
    Negotiation,
    /// Duelists lock their secret choice.
    Decision,
    /// Choices and penalties are shown.
    Reveal,
}

impl DuelPhase {
    /// Client-facing phase name.
    pub fn name(self) -> &'static str {
        match self {
            DuelPhase::Waiting => "waiting",
            DuelPhase::Countdown => "countdown",
            DuelPhase::Negotiation => "negotiation",
            DuelPhase::Decision => "decision",
            DuelPhase::Reveal => "reveal",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Standing {
    points: u32,
    sips: u32,
}

#[derive(Debug, Clone)]
struct RoundResult {
    pairing: Pairing,
    choices: RoundChoices,
    outcome: DuelOutcome,
    defaulted: Vec<PlayerId>,
}

/// Validated effect of an action, computed before anything is mutated.
#[derive(Debug)]
enum DuelPlan {
    Pair,
    Advance,
    Say {
        from: PlayerId,
        display_name: String,
        message: String,
    },
    Lock {
        player: PlayerId,
        choice: Choice,
    },
}

/// Duel game state.
#[derive(Debug)]
pub struct DuelGame {
    phase: DuelPhase,
    round: u32,
    pairing: Option<Pairing>,
    choices: HashMap<PlayerId, Choice>,
    last_result: Option<RoundResult>,
    /// Cumulative totals in the order players first dueled.
    standings: IndexMap<PlayerId, Standing>,
    window: PenaltyWindow,
}

impl DuelGame {
    /// Create the game and try to pair the first round right away.
    pub fn start(ctx: &mut GameContext<'_>) -> (Self, Step) {
        let mut game = Self {
            phase: DuelPhase::Waiting,
            round: 0,
            pairing: None,
            choices: HashMap::new(),
            last_result: None,
            standings: IndexMap::new(),
            window: PenaltyWindow::new(ctx.config.penalty_window),
        };
        let step = game.begin_round(ctx);
        (game, step)
    }

    /// Current phase.
    pub fn phase(&self) -> DuelPhase {
        self.phase
    }

    /// Current duelists, if a round is running.
    pub fn pairing(&self) -> Option<Pairing> {
        self.pairing
    }

    /// Payoffs that the next resolution will use.
    pub fn payoffs(&self) -> Penalties {
        self.window.penalties()
    }

    fn begin_round(&mut self, ctx: &mut GameContext<'_>) -> Step {
        self.choices.clear();
        match matchmaker::pair(ctx.players, ctx.rng) {
            Some(pairing) => {
                self.round += 1;
                self.pairing = Some(pairing);
                for id in [pairing.player_a, pairing.player_b] {
                    self.standings.entry(id).or_default();
                }
                self.phase = DuelPhase::Countdown;
                debug!(round = self.round, "duel round paired");
                Step::enter(TimerRequest::Arm(ctx.ticks(ctx.config.duel.countdown_secs)))
            }
            None => {
                self.pairing = None;
                self.phase = DuelPhase::Waiting;
                Step::enter(TimerRequest::Cancel)
            }
        }
    }

    fn enter_negotiation(&mut self, ctx: &GameContext<'_>) -> Step {
        self.phase = DuelPhase::Negotiation;
        Step::enter(TimerRequest::Arm(
            ctx.ticks(ctx.config.duel.negotiation_secs),
        ))
    }

    fn enter_decision(&mut self, ctx: &GameContext<'_>) -> Step {
        self.phase = DuelPhase::Decision;
        Step::enter(TimerRequest::Arm(ctx.ticks(ctx.config.duel.decision_secs)))
    }

    /// Score the round, filling missing choices with [`DEFAULT_CHOICE`].
    fn resolve(&mut self, ctx: &mut GameContext<'_>) -> Step {
        let Some(pairing) = self.pairing else {
            return self.begin_round(ctx);
        };

        let mut defaulted = Vec::new();
        let mut choice_of = |id: PlayerId| {
            *self.choices.entry(id).or_insert_with(|| {
                defaulted.push(id);
                DEFAULT_CHOICE
            })
        };
        let choices = RoundChoices {
            choice_a: choice_of(pairing.player_a),
            choice_b: choice_of(pairing.player_b),
        };

        let payoffs = self.window.penalties();
        let outcome = matchmaker::score(pairing, choices.choice_a, choices.choice_b, &payoffs);
        self.window.record(choices);

        for (id, points, sips) in [
            (pairing.player_a, outcome.points_a, outcome.sips_a),
            (pairing.player_b, outcome.points_b, outcome.sips_b),
        ] {
            let standing = self.standings.entry(id).or_default();
            standing.points += points;
            standing.sips += sips;
        }

        info!(
            round = self.round,
            choice_a = ?choices.choice_a,
            choice_b = ?choices.choice_b,
            defaulted = defaulted.len(),
            "duel round resolved"
        );

        self.last_result = Some(RoundResult {
            pairing,
            choices,
            outcome,
            defaulted,
        });
        self.phase = DuelPhase::Reveal;
        Step::enter(TimerRequest::Arm(ctx.ticks(ctx.config.duel.reveal_secs)))
    }

    fn require_duelist(&self, actor: PlayerId) -> Result<Pairing, ServiceError> {
        self.pairing
            .filter(|pairing| pairing.contains(actor))
            .ok_or_else(|| ServiceError::Forbidden("only the current duelists can do this".into()))
    }

    fn plan(
        &self,
        ctx: &GameContext<'_>,
        actor: PlayerId,
        action: DuelAction,
    ) -> Result<DuelPlan, ServiceError> {
        match (self.phase, action) {
            (DuelPhase::Waiting, DuelAction::StartRound) => {
                let eligible = ctx
                    .players
                    .iter()
                    .filter(|player| matchmaker::is_eligible(player))
                    .count();
                if eligible < 2 {
                    return Err(ServiceError::InvalidPhase(
                        "a duel needs at least two connected players".into(),
                    ));
                }
                Ok(DuelPlan::Pair)
            }
            (DuelPhase::Countdown | DuelPhase::Negotiation, DuelAction::Skip) => {
                Ok(DuelPlan::Advance)
            }
            (DuelPhase::Negotiation, DuelAction::Negotiate { message }) => {
                self.require_duelist(actor)?;
                let display_name = ctx
                    .player(actor)
                    .map(|player| player.display_name.clone())
                    .unwrap_or_default();
                Ok(DuelPlan::Say {
                    from: actor,
                    display_name,
                    message: message.trim().to_string(),
                })
            }
            (DuelPhase::Decision, DuelAction::Decide { choice }) => {
                self.require_duelist(actor)?;
                if self.choices.contains_key(&actor) {
                    return Err(ServiceError::Conflict("choice already submitted".into()));
                }
                Ok(DuelPlan::Lock {
                    player: actor,
                    choice,
                })
            }
            (phase, action) => Err(ServiceError::InvalidPhase(format!(
                "{} is not allowed during {}",
                action.name(),
                phase.name()
            ))),
        }
    }

    fn apply(&mut self, ctx: &mut GameContext<'_>, plan: DuelPlan) -> Step {
        match plan {
            DuelPlan::Pair => self.begin_round(ctx),
            DuelPlan::Advance => match self.phase {
                DuelPhase::Countdown => self.enter_negotiation(ctx),
                _ => self.enter_decision(ctx),
            },
            DuelPlan::Say {
                from,
                display_name,
                message,
            } => Step::none().with_event(ServerMessage::NegotiationMessage {
                from,
                display_name,
                message,
            }),
            DuelPlan::Lock { player, choice } => {
                self.choices.insert(player, choice);
                if self.choices.len() == 2 {
                    self.resolve(ctx)
                } else {
                    Step::changed()
                }
            }
        }
    }

    /// Whether a duelist left the session or lost their connection.
    fn pairing_broken(&self, ctx: &GameContext<'_>) -> bool {
        self.pairing.is_some_and(|pairing| {
            [pairing.player_a, pairing.player_b].into_iter().any(|id| {
                ctx.player(id)
                    .is_none_or(|player| !matchmaker::is_eligible(player))
            })
        })
    }

    fn result_view(&self) -> Option<DuelResultView> {
        self.last_result.as_ref().map(|result| DuelResultView {
            player_a: result.pairing.player_a,
            player_b: result.pairing.player_b,
            choice_a: result.choices.choice_a,
            choice_b: result.choices.choice_b,
            points_a: result.outcome.points_a,
            points_b: result.outcome.points_b,
            sips_a: result.outcome.sips_a,
            sips_b: result.outcome.sips_b,
            drinkers: result.outcome.drinkers.clone(),
            defaulted: result.defaulted.clone(),
        })
    }
}

impl GameMachine for DuelGame {
    type Action = DuelAction;

    fn game_type(&self) -> GameType {
        GameType::Duel
    }

    fn phase_name(&self) -> &'static str {
        self.phase.name()
    }

    fn is_host_only(action: &DuelAction) -> bool {
        matches!(action, DuelAction::StartRound | DuelAction::Skip)
    }

    fn handle(
        &mut self,
        ctx: &mut GameContext<'_>,
        actor: PlayerId,
        action: DuelAction,
    ) -> Result<Step, ServiceError> {
        let plan = self.plan(ctx, actor, action)?;
        let step = self.apply(ctx, plan);
        Ok(step.with_reply(ServerMessage::ActionAccepted))
    }

    fn on_expire(&mut self, ctx: &mut GameContext<'_>) -> Step {
        match self.phase {
            DuelPhase::Waiting => Step::none(),
            DuelPhase::Countdown => self.enter_negotiation(ctx),
            DuelPhase::Negotiation => self.enter_decision(ctx),
            DuelPhase::Decision => self.resolve(ctx),
            DuelPhase::Reveal => self.begin_round(ctx),
        }
    }

    fn on_roster_change(&mut self, ctx: &mut GameContext<'_>) -> Step {
        let before = self.standings.len();
        self.standings.retain(|id, _| ctx.is_seated(*id));
        let pruned = before != self.standings.len();

        match self.phase {
            DuelPhase::Waiting => {
                let step = self.begin_round(ctx);
                match self.phase {
                    DuelPhase::Waiting if !pruned => Step::none(),
                    DuelPhase::Waiting => Step::changed(),
                    _ => step,
                }
            }
            DuelPhase::Countdown | DuelPhase::Negotiation | DuelPhase::Decision
                if self.pairing_broken(ctx) =>
            {
                info!(round = self.round, "duelist gone; round aborted");
                self.begin_round(ctx)
            }
            _ if pruned => Step::changed(),
            _ => Step::none(),
        }
    }

    fn on_player_reattached(&mut self, old: PlayerId, new: PlayerId) {
        if let Some(pairing) = self.pairing.as_mut() {
            pairing.replace(old, new);
        }
        if let Some(choice) = self.choices.remove(&old) {
            self.choices.insert(new, choice);
        }
        if let Some((index, _, standing)) = self.standings.swap_remove_full(&old) {
            let (last, _) = self.standings.insert_full(new, standing);
            self.standings.swap_indices(index, last);
        }
        if let Some(result) = self.last_result.as_mut() {
            result.pairing.replace(old, new);
            for id in result
                .outcome
                .drinkers
                .iter_mut()
                .chain(result.defaulted.iter_mut())
            {
                if *id == old {
                    *id = new;
                }
            }
        }
    }

    fn snapshot(&self) -> GameSnapshot {
        let payoffs = self.window.penalties();
        let submitted = self
            .pairing
            .map(|pairing| {
                [pairing.player_a, pairing.player_b]
                    .into_iter()
                    .filter(|id| self.choices.contains_key(id))
                    .collect()
            })
            .unwrap_or_default();

        GameSnapshot::Duel(DuelSnapshot {
            round: self.round,
            duelists: self.pairing.map(|pairing| DuelistsView {
                player_a: pairing.player_a,
                player_b: pairing.player_b,
            }),
            submitted,
            payoffs: PayoffsView {
                both_cooperate: payoffs.both_cooperate,
                mixed: payoffs.mixed,
                both_defect: payoffs.both_defect,
            },
            last_result: self.result_view(),
            standings: self
                .standings
                .iter()
                .map(|(id, standing)| StandingView {
                    player_id: *id,
                    points: standing.points,
                    sips: standing.sips,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::games::testing::Table;

    fn decide(choice: Choice) -> DuelAction {
        DuelAction::Decide { choice }
    }

    fn started(table: &mut Table) -> DuelGame {
        let (game, step) = DuelGame::start(&mut table.ctx());
        assert!(step.changed);
        game
    }

    fn skip_to_decision(game: &mut DuelGame, table: &mut Table) {
        let host = table.host();
        game.handle(&mut table.ctx(), host, DuelAction::Skip).unwrap();
        game.handle(&mut table.ctx(), host, DuelAction::Skip).unwrap();
        assert_eq!(game.phase(), DuelPhase::Decision);
    }

    #[test]
    fn lone_player_waits_for_an_opponent() {
        let mut table = Table::with_players(&["Alice"]);
        let (mut game, step) = DuelGame::start(&mut table.ctx());
        assert_eq!(game.phase(), DuelPhase::Waiting);
        assert_eq!(step.timer, TimerRequest::Cancel);

        let host = table.host();
        let err = game
            .handle(&mut table.ctx(), host, DuelAction::StartRound)
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPhase(_)));

        table.players.push(crate::state::session::Player::new(
            uuid::Uuid::new_v4(),
            "Bob".into(),
        ));
        let step = game.on_roster_change(&mut table.ctx());
        assert_eq!(game.phase(), DuelPhase::Countdown);
        assert!(matches!(step.timer, TimerRequest::Arm(3)));
    }

    #[test]
    fn full_round_with_both_choices() {
        let mut table = Table::with_players(&["Alice", "Bob"]);
        let mut game = started(&mut table);
        assert_eq!(game.phase(), DuelPhase::Countdown);

        let step = game.on_expire(&mut table.ctx());
        assert_eq!(game.phase(), DuelPhase::Negotiation);
        assert_eq!(step.timer, TimerRequest::Arm(30));

        game.on_expire(&mut table.ctx());
        assert_eq!(game.phase(), DuelPhase::Decision);

        let (alice, bob) = (table.id("Alice"), table.id("Bob"));
        let step = game
            .handle(&mut table.ctx(), alice, decide(Choice::Cooperate))
            .unwrap();
        assert_eq!(game.phase(), DuelPhase::Decision);
        assert_eq!(step.timer, TimerRequest::Keep);
        assert_eq!(step.reply, Some(ServerMessage::ActionAccepted));

        let step = game
            .handle(&mut table.ctx(), bob, decide(Choice::Defect))
            .unwrap();
        assert_eq!(game.phase(), DuelPhase::Reveal);
        assert_eq!(step.timer, TimerRequest::Arm(5));

        let GameSnapshot::Duel(snapshot) = game.snapshot() else {
            panic!("duel snapshot expected");
        };
        let result = snapshot.last_result.unwrap();
        let (alice_points, bob_points) = if result.player_a == alice {
            (result.points_a, result.points_b)
        } else {
            (result.points_b, result.points_a)
        };
        assert_eq!((alice_points, bob_points), (0, 5));
        assert_eq!(result.drinkers, vec![alice]);
        assert!(result.defaulted.is_empty());
    }

    #[test]
    fn second_choice_is_rejected() {
        let mut table = Table::with_players(&["Alice", "Bob"]);
        let mut game = started(&mut table);
        skip_to_decision(&mut game, &mut table);

        let alice = table.id("Alice");
        game.handle(&mut table.ctx(), alice, decide(Choice::Cooperate))
            .unwrap();
        let err = game
            .handle(&mut table.ctx(), alice, decide(Choice::Defect))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn expired_decision_defaults_missing_choice() {
        let mut table = Table::with_players(&["Alice", "Bob"]);
        let mut game = started(&mut table);
        skip_to_decision(&mut game, &mut table);

        let alice = table.id("Alice");
        let bob = table.id("Bob");
        game.handle(&mut table.ctx(), alice, decide(Choice::Cooperate))
            .unwrap();
        game.on_expire(&mut table.ctx());

        assert_eq!(game.phase(), DuelPhase::Reveal);
        let GameSnapshot::Duel(snapshot) = game.snapshot() else {
            panic!("duel snapshot expected");
        };
        let result = snapshot.last_result.unwrap();
        assert_eq!(result.defaulted, vec![bob]);
        assert_eq!(result.drinkers, vec![alice]);
    }

    #[test]
    fn spectators_cannot_negotiate_or_decide() {
        let mut table = Table::with_players(&["Alice", "Bob", "Carol"]);
        let mut game = started(&mut table);
        let spectator = table
            .players
            .iter()
            .map(|player| player.id)
            .find(|id| !game.pairing().unwrap().contains(*id))
            .unwrap();

        let host = table.host();
        game.handle(&mut table.ctx(), host, DuelAction::Skip).unwrap();
        let err = game
            .handle(
                &mut table.ctx(),
                spectator,
                DuelAction::Negotiate {
                    message: "trust me".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn actions_outside_their_phase_are_rejected() {
        let mut table = Table::with_players(&["Alice", "Bob"]);
        let mut game = started(&mut table);
        let alice = table.id("Alice");
        let err = game
            .handle(&mut table.ctx(), alice, decide(Choice::Cooperate))
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPhase(_)));
        assert_eq!(game.phase(), DuelPhase::Countdown);
    }

    #[test]
    fn losing_a_duelist_aborts_the_round() {
        let mut table = Table::with_players(&["Alice", "Bob"]);
        let mut game = started(&mut table);
        skip_to_decision(&mut game, &mut table);

        table.players.truncate(1);
        let step = game.on_roster_change(&mut table.ctx());
        assert_eq!(game.phase(), DuelPhase::Waiting);
        assert_eq!(step.timer, TimerRequest::Cancel);
        assert!(game.pairing().is_none());
    }

    #[test]
    fn reveal_expiry_starts_next_round_with_updated_payoffs() {
        let mut table = Table::with_players(&["Alice", "Bob"]);
        let mut game = started(&mut table);
        skip_to_decision(&mut game, &mut table);
        game.on_expire(&mut table.ctx());

        // Both defaulted to defect: the window is fully hostile.
        assert_eq!(
            game.payoffs(),
            Penalties {
                both_cooperate: 5,
                mixed: 3,
                both_defect: 4,
            }
        );

        game.on_expire(&mut table.ctx());
        assert_eq!(game.phase(), DuelPhase::Countdown);
        let GameSnapshot::Duel(snapshot) = game.snapshot() else {
            panic!("duel snapshot expected");
        };
        assert_eq!(snapshot.round, 2);
        assert!(snapshot.submitted.is_empty());
    }

    #[test]
    fn reattached_duelist_keeps_seat_and_standing() {
        let mut table = Table::with_players(&["Alice", "Bob"]);
        let mut game = started(&mut table);
        skip_to_decision(&mut game, &mut table);

        let alice = table.id("Alice");
        game.handle(&mut table.ctx(), alice, decide(Choice::Cooperate))
            .unwrap();

        let fresh = uuid::Uuid::new_v4();
        game.on_player_reattached(alice, fresh);
        table.players[0].id = fresh;

        assert!(game.pairing().unwrap().contains(fresh));
        let bob = table.id("Bob");
        game.handle(&mut table.ctx(), bob, decide(Choice::Cooperate))
            .unwrap();
        let GameSnapshot::Duel(snapshot) = game.snapshot() else {
            panic!("duel snapshot expected");
        };
        assert!(snapshot.standings.iter().any(|s| s.player_id == fresh && s.points == 3));
        assert!(snapshot.standings.iter().all(|s| s.player_id != alice));
    }
}
