//! Generic driver shared by every game: phase names, timer requests and broadcast steps.
//!
//! Games validate an action into a plan before touching their own state, so a rejected
//! action never leaves a partial mutation behind. The registry applies the resulting
//! [`Step`] as one unit: timer first, then a single post-mutation snapshot, then events.

use rand::rngs::StdRng;

use crate::{
    config::AppConfig,
    dto::{
        game::{GameAction, GameSnapshot, GameStateView},
        ws::ServerMessage,
    },
    error::ServiceError,
    state::{
        games::{duel::DuelGame, statements::StatementsGame, wheel::WheelGame},
        session::{GameType, Player, PlayerId},
        timer::TimerHandle,
    },
};

/// Read-only view of the session handed to a game, plus the shared random source.
pub struct GameContext<'a> {
    /// Current players in join order.
    pub players: &'a [Player],
    /// Current host.
    pub host_id: PlayerId,
    /// Game timings and limits.
    pub config: &'a AppConfig,
    /// Shared random source of the registry.
    pub rng: &'a mut StdRng,
}

impl GameContext<'_> {
    /// Whether `id` is the host.
    pub fn is_host(&self, id: PlayerId) -> bool {
        self.host_id == id
    }

    /// Look up a player by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Whether `id` belongs to a seat that still exists (connected or held).
    pub fn is_seated(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// Ticks for a duration expressed in seconds.
    pub fn ticks(&self, secs: u64) -> u32 {
        self.config.ticks_for_secs(secs)
    }
}

/// What to do with the session's game countdown after a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimerRequest {
    /// Leave the current countdown alone.
    #[default]
    Keep,
    /// Replace the countdown with a new one of this many ticks.
    Arm(u32),
    /// Disarm the countdown.
    Cancel,
}

/// Outcome of a transition, applied atomically by the registry.
#[derive(Debug, Default)]
pub struct Step {
    /// Game state changed; a fresh snapshot must be broadcast.
    pub changed: bool,
    /// What to do with the game countdown.
    pub timer: TimerRequest,
    /// Extra messages for every connection of the session.
    pub events: Vec<ServerMessage>,
    /// Private message for the acting connection.
    pub reply: Option<ServerMessage>,
}

impl Step {
    /// Nothing happened.
    pub fn none() -> Self {
        Self::default()
    }

    /// State changed without touching the countdown.
    pub fn changed() -> Self {
        Self {
            changed: true,
            ..Self::default()
        }
    }

    /// State changed and the countdown must follow `timer`.
    pub fn enter(timer: TimerRequest) -> Self {
        Self {
            changed: true,
            timer,
            ..Self::default()
        }
    }

    /// Attach a broadcast event.
    pub fn with_event(mut self, event: ServerMessage) -> Self {
        self.events.push(event);
        self
    }

    /// Attach the private reply for the actor.
    pub fn with_reply(mut self, reply: ServerMessage) -> Self {
        self.reply = Some(reply);
        self
    }
}

/// Contract implemented by each game.
pub trait GameMachine {
    /// Game-specific action type.
    type Action;

    /// Which game this is.
    fn game_type(&self) -> GameType;

    /// Name of the current phase, as shown to clients.
    fn phase_name(&self) -> &'static str;

    /// Whether `action` may only be performed by the host.
    fn is_host_only(action: &Self::Action) -> bool;

    /// Validate and apply a player action.
    fn handle(
        &mut self,
        ctx: &mut GameContext<'_>,
        actor: PlayerId,
        action: Self::Action,
    ) -> Result<Step, ServiceError>;

    /// Called on every countdown tick that did not expire.
    fn on_tick(&mut self, _remaining: u32) -> Vec<ServerMessage> {
        Vec::new()
    }

    /// Called once when the game countdown reaches zero.
    fn on_expire(&mut self, ctx: &mut GameContext<'_>) -> Step;

    /// Called after players joined, left or lost their connection.
    fn on_roster_change(&mut self, _ctx: &mut GameContext<'_>) -> Step {
        Step::none()
    }

    /// Called when a seat is taken over by a new connection id.
    fn on_player_reattached(&mut self, _old: PlayerId, _new: PlayerId) {}

    /// Sanitized public projection.
    fn snapshot(&self) -> GameSnapshot;
}

/// Active game of a session.
#[derive(Debug)]
pub enum GameState {
    /// Duel game.
    Duel(DuelGame),
    /// Wheel game.
    Wheel(WheelGame),
    /// Statements game.
    Statements(StatementsGame),
}

impl GameState {
    /// Build the initial state of `game_type`; `None` for the lobby.
    pub fn start(game_type: GameType, ctx: &mut GameContext<'_>) -> Option<(Self, Step)> {
        match game_type {
            GameType::None => None,
            GameType::Duel => {
                let (game, step) = DuelGame::start(ctx);
                Some((GameState::Duel(game), step))
            }
            GameType::Wheel => Some((GameState::Wheel(WheelGame::new()), Step::changed())),
            GameType::Statements => {
                let (game, step) = StatementsGame::start(ctx);
                Some((GameState::Statements(game), step))
            }
        }
    }

    /// Which game this is.
    pub fn game_type(&self) -> GameType {
        match self {
            GameState::Duel(game) => game.game_type(),
            GameState::Wheel(game) => game.game_type(),
            GameState::Statements(game) => game.game_type(),
        }
    }

    /// Current phase name.
    pub fn phase_name(&self) -> &'static str {
        match self {
            GameState::Duel(game) => game.phase_name(),
            GameState::Wheel(game) => game.phase_name(),
            GameState::Statements(game) => game.phase_name(),
        }
    }

    /// Route an action to the game it targets.
    ///
    /// Host-only actions are checked by the registry before this is called.
    pub fn handle(
        &mut self,
        ctx: &mut GameContext<'_>,
        actor: PlayerId,
        action: GameAction,
    ) -> Result<Step, ServiceError> {
        match (self, action) {
            (GameState::Duel(game), GameAction::Duel(action)) => {
                game.handle(ctx, actor, action)
            }
            (GameState::Wheel(game), GameAction::Wheel(action)) => {
                game.handle(ctx, actor, action)
            }
            (GameState::Statements(game), GameAction::Statements(action)) => {
                game.handle(ctx, actor, action)
            }
            (state, action) => Err(ServiceError::InvalidPhase(format!(
                "action targets {:?} but the active game is {:?}",
                action.game_type(),
                state.game_type()
            ))),
        }
    }

    /// Forward a countdown tick.
    pub fn on_tick(&mut self, remaining: u32) -> Vec<ServerMessage> {
        match self {
            GameState::Duel(game) => game.on_tick(remaining),
            GameState::Wheel(game) => game.on_tick(remaining),
            GameState::Statements(game) => game.on_tick(remaining),
        }
    }

    /// Forward countdown expiry.
    pub fn on_expire(&mut self, ctx: &mut GameContext<'_>) -> Step {
        match self {
            GameState::Duel(game) => game.on_expire(ctx),
            GameState::Wheel(game) => game.on_expire(ctx),
            GameState::Statements(game) => game.on_expire(ctx),
        }
    }

    /// Forward a roster change.
    pub fn on_roster_change(&mut self, ctx: &mut GameContext<'_>) -> Step {
        match self {
            GameState::Duel(game) => game.on_roster_change(ctx),
            GameState::Wheel(game) => game.on_roster_change(ctx),
            GameState::Statements(game) => game.on_roster_change(ctx),
        }
    }

    /// Forward a seat takeover.
    pub fn on_player_reattached(&mut self, old: PlayerId, new: PlayerId) {
        match self {
            GameState::Duel(game) => game.on_player_reattached(old, new),
            GameState::Wheel(game) => game.on_player_reattached(old, new),
            GameState::Statements(game) => game.on_player_reattached(old, new),
        }
    }

    /// Public view, with the timer fields filled from the armed countdown.
    pub fn view(&self, timer: Option<&TimerHandle>) -> GameStateView {
        let details = match self {
            GameState::Duel(game) => game.snapshot(),
            GameState::Wheel(game) => game.snapshot(),
            GameState::Statements(game) => game.snapshot(),
        };
        GameStateView {
            phase: self.phase_name(),
            time_remaining: timer.map(|handle| handle.remaining),
            timer_duration: timer.map(|handle| handle.duration),
            details,
        }
    }
}
