//! Game actions accepted from clients and the sanitized game projections sent back.

use serde::{Deserialize, Serialize};

use crate::state::{
    games::{
        duel::DuelGame, matchmaker::Choice, statements::StatementsGame, wheel::WheelGame,
    },
    phase::GameMachine,
    session::{GameType, PlayerId},
};

/// Game-specific action, tagged with the game it targets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum GameAction {
    /// Duel game action.
    Duel(DuelAction),
    /// Wheel game action.
    Wheel(WheelAction),
    /// Statements game action.
    Statements(StatementsAction),
}

impl GameAction {
    /// Game this action is meant for.
    pub fn game_type(&self) -> GameType {
        match self {
            GameAction::Duel(_) => GameType::Duel,
            GameAction::Wheel(_) => GameType::Wheel,
            GameAction::Statements(_) => GameType::Statements,
        }
    }

    /// Whether only the host may send this action, whatever game is running.
    pub fn is_host_only(&self) -> bool {
        match self {
            GameAction::Duel(action) => DuelGame::is_host_only(action),
            GameAction::Wheel(action) => WheelGame::is_host_only(action),
            GameAction::Statements(action) => StatementsGame::is_host_only(action),
        }
    }
}

/// Actions of the duel game.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DuelAction {
    /// Host retries pairing while waiting for players.
    StartRound,
    /// Host fast-forwards the countdown or the negotiation.
    Skip,
    /// Duelist talks to the opponent during negotiation.
    Negotiate {
        /// Free text shown to the whole session.
        message: String,
    },
    /// Duelist locks in a choice during decision.
    Decide {
        /// Secret choice of the duelist.
        choice: Choice,
    },
}

impl DuelAction {
    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            DuelAction::StartRound => "start_round",
            DuelAction::Skip => "skip",
            DuelAction::Negotiate { .. } => "negotiate",
            DuelAction::Decide { .. } => "decide",
        }
    }
}

/// Actions of the wheel game.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WheelAction {
    /// Host spins the wheel.
    Spin,
    /// Host clears the result for the next spin.
    Next,
}

impl WheelAction {
    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            WheelAction::Spin => "spin",
            WheelAction::Next => "next",
        }
    }
}

/// Actions of the statements game.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementsAction {
    /// Player submits their statement for the round.
    Submit {
        /// Statement text.
        text: String,
    },
    /// Host moves to the next statement.
    NextStatement,
    /// Host starts a new round.
    Restart,
}

impl StatementsAction {
    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            StatementsAction::Submit { .. } => "submit",
            StatementsAction::NextStatement => "next_statement",
            StatementsAction::Restart => "restart",
        }
    }
}

/// Public projection of the active game, including the timer fields managed by the framework.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameStateView {
    /// Wire name of the current phase.
    pub phase: &'static str,
    /// Seconds left on the active countdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<u32>,
    /// Seconds the active countdown started with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_duration: Option<u32>,
    /// Game-specific fields, flattened.
    #[serde(flatten)]
    pub details: GameSnapshot,
}

/// Per-game payload of [`GameStateView`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum GameSnapshot {
    /// Duel fields.
    Duel(DuelSnapshot),
    /// Wheel fields.
    Wheel(WheelSnapshot),
    /// Statements fields.
    Statements(StatementsSnapshot),
}

/// Duel state visible to every player. Choices stay hidden until the reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuelSnapshot {
    /// Rounds started so far.
    pub round: u32,
    /// Absent while waiting for players.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duelists: Option<DuelistsView>,
    /// Duelists who already locked a choice.
    pub submitted: Vec<PlayerId>,
    /// Payoffs of the current round.
    pub payoffs: PayoffsView,
    /// Set once the reveal starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<DuelResultView>,
    /// Totals of every player who has duelled.
    pub standings: Vec<StandingView>,
}

/// The two players of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuelistsView {
    /// First duelist.
    pub player_a: PlayerId,
    /// Second duelist.
    pub player_b: PlayerId,
}

/// Payoffs in effect for the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayoffsView {
    /// Points each when both cooperate.
    pub both_cooperate: u32,
    /// Points for the defector when choices differ.
    pub mixed: u32,
    /// Points each when both defect.
    pub both_defect: u32,
}

/// Revealed result of the last round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuelResultView {
    /// First duelist.
    pub player_a: PlayerId,
    /// Second duelist.
    pub player_b: PlayerId,
    /// Choice of the first duelist.
    pub choice_a: Choice,
    /// Choice of the second duelist.
    pub choice_b: Choice,
    /// Points won by the first duelist.
    pub points_a: u32,
    /// Points won by the second duelist.
    pub points_b: u32,
    /// Sips owed by the first duelist.
    pub sips_a: u32,
    /// Sips owed by the second duelist.
    pub sips_b: u32,
    /// Players who drink this round.
    pub drinkers: Vec<PlayerId>,
    /// Duelists whose choice was filled in when the decision timer ran out.
    pub defaulted: Vec<PlayerId>,
}

/// Cumulative duel totals of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingView {
    /// Player the totals belong to.
    pub player_id: PlayerId,
    /// Total points.
    pub points: u32,
    /// Total sips.
    pub sips: u32,
}

/// Wheel state; the drawn outcome is only visible once the spin is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WheelSnapshot {
    /// Spins completed in this game.
    pub spins: u32,
    /// Only set in the result phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<WheelOutcomeView>,
}

/// Result of a wheel spin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WheelOutcomeView {
    /// Player the wheel landed on.
    pub target_id: PlayerId,
    /// Display name of the target.
    pub target_name: String,
    /// Penalty severity label.
    pub severity: String,
    /// Penalty category label.
    pub category: String,
}

/// Statements state; authors are only revealed once every statement has been shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementsSnapshot {
    /// Current round, starting at 1.
    pub round: u32,
    /// Number of players expected to submit.
    pub expected: usize,
    /// Players who already submitted.
    pub submitted: Vec<PlayerId>,
    /// Only set while revealing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentStatementView>,
    /// Filled once the round is finished.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub revealed: Vec<RevealedStatementView>,
}

/// Statement currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentStatementView {
    /// Zero-based position in the shuffled list.
    pub index: usize,
    /// Number of statements in the round.
    pub total: usize,
    /// Statement text.
    pub text: String,
}

/// Statement with its author, shown at the end of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevealedStatementView {
    /// Statement text.
    pub text: String,
    /// `None` for statements seeded by the server.
    pub author: Option<PlayerId>,
}
