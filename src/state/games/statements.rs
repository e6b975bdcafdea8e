//! Anonymous statements: everyone writes one, the host reveals them one by one,
//! authors are shown at the end.

use rand::seq::{IndexedRandom, SliceRandom};
use tracing::info;

use crate::{
    dto::{
        game::{
            CurrentStatementView, GameSnapshot, RevealedStatementView, StatementsAction,
            StatementsSnapshot,
        },
        ws::ServerMessage,
    },
    error::ServiceError,
    state::{
        games::matchmaker::is_eligible,
        phase::{GameContext, GameMachine, Step, TimerRequest},
        session::{GameType, PlayerId},
    },
};

/// Server-provided statements mixed into every round; they never count toward quorum.
const SEEDED_STATEMENTS: [&str; 8] = [
    "I have never broken a bone.",
    "I once got lost in my own neighbourhood.",
    "I can name every planet in order.",
    "I have sung karaoke in front of strangers.",
    "I have eaten something that fell on the floor.",
    "I have met someone famous.",
    "I have fallen asleep in a cinema.",
    "I still know my childhood phone number.",
];
/// Seeded statements added per round.
const SEEDED_PER_ROUND: usize = 2;

/// Phases of the statements game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementsPhase {
    /// Players are submitting statements.
    Collecting,
    /// Statements are shown one by one.
    Revealing,
    /// Authors are revealed.
    Finished,
}

impl StatementsPhase {
    /// Client-facing phase name.
    pub fn name(self) -> &'static str {
        match self {
            StatementsPhase::Collecting => "collecting",
            StatementsPhase::Revealing => "revealing",
            StatementsPhase::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Statement {
    text: String,
    /// `None` for seeded statements.
    author: Option<PlayerId>,
}

#[derive(Debug)]
enum StatementsPlan {
    Add { author: PlayerId, text: String },
    Advance,
    Restart,
}

/// Statements game state.
#[derive(Debug)]
pub struct StatementsGame {
    phase: StatementsPhase,
    round: u32,
    /// Players whose submission is awaited this round.
    expected: Vec<PlayerId>,
    statements: Vec<Statement>,
    /// Reveal order, as indices into `statements`.
    order: Vec<usize>,
    cursor: usize,
}

impl StatementsGame {
    /// Create the game and open the first collection round.
    pub fn start(ctx: &mut GameContext<'_>) -> (Self, Step) {
        let mut game = Self {
            phase: StatementsPhase::Collecting,
            round: 0,
            expected: Vec::new(),
            statements: Vec::new(),
            order: Vec::new(),
            cursor: 0,
        };
        let step = game.begin_collecting(ctx);
        (game, step)
    }

    /// Current phase.
    pub fn phase(&self) -> StatementsPhase {
        self.phase
    }

    fn begin_collecting(&mut self, ctx: &mut GameContext<'_>) -> Step {
        self.round += 1;
        self.expected = ctx
            .players
            .iter()
            .filter(|player| is_eligible(player))
            .map(|player| player.id)
            .collect();
        self.statements = SEEDED_STATEMENTS
            .choose_multiple(ctx.rng, SEEDED_PER_ROUND)
            .map(|text| Statement {
                text: text.to_string(),
                author: None,
            })
            .collect();
        self.order.clear();
        self.cursor = 0;
        self.phase = StatementsPhase::Collecting;
        Step::enter(TimerRequest::Arm(
            ctx.ticks(ctx.config.statements_collect_secs),
        ))
    }

    fn enter_revealing(&mut self, ctx: &mut GameContext<'_>) -> Step {
        let mut order: Vec<usize> = (0..self.statements.len()).collect();
        order.shuffle(ctx.rng);
        self.order = order;
        self.cursor = 0;
        self.phase = StatementsPhase::Revealing;
        info!(
            round = self.round,
            statements = self.statements.len(),
            "statements revealing"
        );
        Step::enter(TimerRequest::Cancel)
    }

    /// Statements written by players still expected this round.
    fn counted_submissions(&self) -> usize {
        self.statements
            .iter()
            .filter(|statement| {
                statement
                    .author
                    .is_some_and(|author| self.expected.contains(&author))
            })
            .count()
    }

    fn quorum_reached(&self) -> bool {
        !self.expected.is_empty() && self.counted_submissions() >= self.expected.len()
    }

    fn plan(
        &self,
        actor: PlayerId,
        action: StatementsAction,
    ) -> Result<StatementsPlan, ServiceError> {
        match (self.phase, action) {
            (StatementsPhase::Collecting, StatementsAction::Submit { text }) => {
                if self
                    .statements
                    .iter()
                    .any(|statement| statement.author == Some(actor))
                {
                    return Err(ServiceError::Conflict("statement already submitted".into()));
                }
                Ok(StatementsPlan::Add {
                    author: actor,
                    text: text.trim().to_string(),
                })
            }
            (StatementsPhase::Revealing, StatementsAction::NextStatement) => {
                Ok(StatementsPlan::Advance)
            }
            (StatementsPhase::Finished, StatementsAction::Restart) => Ok(StatementsPlan::Restart),
            (phase, action) => Err(ServiceError::InvalidPhase(format!(
                "{} is not allowed during {}",
                action.name(),
                phase.name()
            ))),
        }
    }
}

impl GameMachine for StatementsGame {
    type Action = StatementsAction;

    fn game_type(&self) -> GameType {
        GameType::Statements
    }

    fn phase_name(&self) -> &'static str {
        self.phase.name()
    }

    fn is_host_only(action: &StatementsAction) -> bool {
        matches!(
            action,
            StatementsAction::NextStatement | StatementsAction::Restart
        )
    }

    fn handle(
        &mut self,
        ctx: &mut GameContext<'_>,
        actor: PlayerId,
        action: StatementsAction,
    ) -> Result<Step, ServiceError> {
        let step = match self.plan(actor, action)? {
            StatementsPlan::Add { author, text } => {
                self.statements.push(Statement {
                    text,
                    author: Some(author),
                });
                if self.quorum_reached() {
                    self.enter_revealing(ctx)
                } else {
                    Step::changed()
                }
            }
            StatementsPlan::Advance => {
                self.cursor += 1;
                if self.cursor >= self.order.len() {
                    self.phase = StatementsPhase::Finished;
                }
                Step::changed()
            }
            StatementsPlan::Restart => self.begin_collecting(ctx),
        };
        Ok(step.with_reply(ServerMessage::ActionAccepted))
    }

    fn on_expire(&mut self, ctx: &mut GameContext<'_>) -> Step {
        match self.phase {
            StatementsPhase::Collecting => self.enter_revealing(ctx),
            _ => Step::none(),
        }
    }

    fn on_roster_change(&mut self, ctx: &mut GameContext<'_>) -> Step {
        if self.phase != StatementsPhase::Collecting {
            return Step::none();
        }
        let before = self.expected.len();
        self.expected.retain(|id| ctx.is_seated(*id));
        if self.quorum_reached() {
            return self.enter_revealing(ctx);
        }
        if before != self.expected.len() {
            Step::changed()
        } else {
            Step::none()
        }
    }

    fn on_player_reattached(&mut self, old: PlayerId, new: PlayerId) {
        for id in self.expected.iter_mut() {
            if *id == old {
                *id = new;
            }
        }
        for statement in self.statements.iter_mut() {
            if statement.author == Some(old) {
                statement.author = Some(new);
            }
        }
    }

    fn snapshot(&self) -> GameSnapshot {
        let submitted = self
            .statements
            .iter()
            .filter_map(|statement| statement.author)
            .collect();

        let current = match self.phase {
            StatementsPhase::Revealing => self
                .order
                .get(self.cursor)
                .and_then(|index| self.statements.get(*index))
                .map(|statement| CurrentStatementView {
                    index: self.cursor,
                    total: self.order.len(),
                    text: statement.text.clone(),
                }),
            _ => None,
        };

        let revealed = match self.phase {
            StatementsPhase::Finished => self
                .order
                .iter()
                .filter_map(|index| self.statements.get(*index))
                .map(|statement| RevealedStatementView {
                    text: statement.text.clone(),
                    author: statement.author,
                })
                .collect(),
            _ => Vec::new(),
        };

        GameSnapshot::Statements(StatementsSnapshot {
            round: self.round,
            expected: self.expected.len(),
            submitted,
            current,
            revealed,
        })
    }
}
