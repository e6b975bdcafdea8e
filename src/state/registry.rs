//! Owner of every session record: creation, joining, game selection, action dispatch,
//! timer callbacks and the inactivity sweep.
//!
//! The registry is synchronous and performs no I/O. Each operation returns an
//! [`Outbox`] with the deliveries and ticker commands it produced; the caller applies
//! it while still holding exclusive access so every connection observes messages in
//! mutation order.

use std::{
    collections::HashMap,
    sync::Arc,
    time::Instant,
};

use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    dto::{
        game::GameAction,
        search::Track,
        session::{PlayerSummary, SessionSnapshot},
        ws::{CloseReason, ServerMessage},
    },
    error::ServiceError,
    state::{
        outbox::Outbox,
        phase::{GameContext, GameState, Step, TimerRequest},
        session::{
            ConnectionId, DisconnectedHost, GameType, Player, PlayerId, Session, SessionCode,
        },
        timer::{TickOutcome, TimerId, TimerKey, TimerSlot, TimerTable},
    },
};

/// Code draws attempted before giving up with [`ServiceError::CapacityExceeded`].
const MAX_CODE_ATTEMPTS: usize = 64;

/// How a join request is admitted, decided before anything is mutated.
enum Admission {
    /// Take over the seat of the host held during the grace window.
    ReclaimHost(PlayerId),
    /// Take over another disconnected seat with the same name.
    Reattach(PlayerId),
    /// Add a brand new player.
    Fresh,
}

/// Sessions, connection memberships, held host seats and countdowns.
pub struct SessionRegistry {
    pub(super) config: Arc<AppConfig>,
    pub(super) sessions: HashMap<SessionCode, Session>,
    pub(super) memberships: HashMap<ConnectionId, SessionCode>,
    pub(super) disconnected_hosts: HashMap<SessionCode, DisconnectedHost>,
    pub(super) timers: TimerTable,
    pub(super) rng: StdRng,
}

impl SessionRegistry {
    /// Registry seeded from the operating system.
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Registry with a deterministic random source.
    pub fn with_seed(config: Arc<AppConfig>, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: Arc<AppConfig>, rng: StdRng) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            memberships: HashMap::new(),
            disconnected_hosts: HashMap::new(),
            timers: TimerTable::new(),
            rng,
        }
    }

    /// Look up a session.
    pub fn session(&self, code: &SessionCode) -> Option<&Session> {
        self.sessions.get(code)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Session a connection currently belongs to.
    pub fn membership(&self, connection: ConnectionId) -> Option<&SessionCode> {
        self.memberships.get(&connection)
    }

    /// Held seat of a disconnected host, if any.
    pub fn disconnected_host(&self, code: &SessionCode) -> Option<&DisconnectedHost> {
        self.disconnected_hosts.get(code)
    }

    /// Countdown bookkeeping.
    pub fn timers(&self) -> &TimerTable {
        &self.timers
    }

    /// Create a session hosted by `connection`, leaving any session it was in.
    pub fn create_session(
        &mut self,
        connection: ConnectionId,
        display_name: &str,
        now: Instant,
    ) -> Result<Outbox, ServiceError> {
        let code = self.generate_code()?;
        let mut outbox = self.leave_session(connection, now);

        let host = Player::new(connection, display_name.trim().to_string());
        self.sessions
            .insert(code.clone(), Session::new(code.clone(), host, now));
        self.memberships.insert(connection, code.clone());
        info!(code = %code, connection_id = %connection, "session created");

        if let Some(session) = self.snapshot(&code) {
            outbox.unicast(
                connection,
                ServerMessage::SessionCreated {
                    player_id: connection,
                    session,
                },
            );
        }
        Ok(outbox)
    }

    /// Join a session by code, reclaiming a held seat when the name matches one.
    pub fn join_session(
        &mut self,
        connection: ConnectionId,
        code: &str,
        display_name: &str,
        now: Instant,
    ) -> Result<Outbox, ServiceError> {
        let code = SessionCode::parse(code);
        let display_name = display_name.trim();
        let admission = self.admit(connection, &code, display_name)?;

        let mut outbox = self.leave_session(connection, now);
        match admission {
            Admission::ReclaimHost(old) => {
                let away_secs = self
                    .disconnected_hosts
                    .remove(&code)
                    .map(|held| now.saturating_duration_since(held.disconnected_at).as_secs())
                    .unwrap_or_default();
                let key = TimerKey::host_grace(&code);
                if self.timers.cancel(&key) {
                    outbox.stop_timer(key);
                }
                info!(code = %code, connection_id = %connection, away_secs, "host reconnected within grace window");
                self.reattach(&code, old, connection, now, &mut outbox);
            }
            Admission::Reattach(old) => {
                info!(code = %code, connection_id = %connection, "player reconnected by name");
                self.reattach(&code, old, connection, now, &mut outbox);
            }
            Admission::Fresh => {
                let Some(session) = self.sessions.get_mut(&code) else {
                    return Ok(outbox);
                };
                session
                    .players
                    .push(Player::new(connection, display_name.to_string()));
                session.touch(now);
                self.memberships.insert(connection, code.clone());
                info!(code = %code, connection_id = %connection, player = display_name, "player joined");

                if let Some(session) = self.snapshot(&code) {
                    outbox.unicast(
                        connection,
                        ServerMessage::SessionJoined {
                            player_id: connection,
                            session,
                            reconnected: false,
                        },
                    );
                }
                self.roster_changed(&code, &mut outbox);
            }
        }
        Ok(outbox)
    }

    /// Validate a join request without mutating anything.
    fn admit(
        &self,
        connection: ConnectionId,
        code: &SessionCode,
        display_name: &str,
    ) -> Result<Admission, ServiceError> {
        let session = self
            .sessions
            .get(code)
            .ok_or_else(|| ServiceError::NotFound(code.to_string()))?;

        if self.memberships.get(&connection) == Some(code) {
            return Err(ServiceError::Conflict("already a member of this session".into()));
        }

        if let Some(held) = self
            .disconnected_hosts
            .get(code)
            .filter(|held| held.host_name == display_name)
        {
            return Ok(Admission::ReclaimHost(held.host_id));
        }

        match session.player_by_name(display_name) {
            Some(player) if player.disconnected => Ok(Admission::Reattach(player.id)),
            Some(_) => Err(ServiceError::NameTaken(display_name.to_string())),
            None if session.players.len() >= self.config.max_players => {
                Err(ServiceError::Full(self.config.max_players))
            }
            None => Ok(Admission::Fresh),
        }
    }

    /// Leave the current session; a no-op when the connection is in none.
    pub fn leave_session(&mut self, connection: ConnectionId, now: Instant) -> Outbox {
        let mut outbox = Outbox::new();
        let Some(code) = self.memberships.remove(&connection) else {
            return outbox;
        };
        if let Some(session) = self.sessions.get_mut(&code) {
            session.touch(now);
        }
        info!(code = %code, connection_id = %connection, "player left");
        outbox.unicast(connection, ServerMessage::SessionLeft { code: code.clone() });
        self.remove_player(&code, connection, &mut outbox);
        outbox
    }

    /// Hand the host role to another connected player.
    pub fn transfer_host(
        &mut self,
        connection: ConnectionId,
        code: &str,
        new_host_id: PlayerId,
        now: Instant,
    ) -> Result<Outbox, ServiceError> {
        let (code, actor) = self.member(connection, code)?;
        let session = self
            .sessions
            .get_mut(&code)
            .ok_or_else(|| ServiceError::NotFound(code.to_string()))?;

        if !session.is_host(actor) {
            return Err(ServiceError::Forbidden(
                "only the host can transfer the host role".into(),
            ));
        }
        if new_host_id == actor {
            return Err(ServiceError::Conflict("already the host".into()));
        }
        if !session
            .player(new_host_id)
            .is_some_and(|player| !player.disconnected)
        {
            return Err(ServiceError::InvalidInput(format!(
                "player {new_host_id} is not connected to this session"
            )));
        }

        session.host_id = new_host_id;
        session.touch(now);
        info!(code = %code, from = %actor, to = %new_host_id, "host transferred");

        let mut outbox = Outbox::new();
        let recipients = session.connected_ids();
        outbox.broadcast(
            recipients,
            ServerMessage::HostChanged {
                host_id: new_host_id,
                previous_host_id: actor,
            },
        );
        self.broadcast_players(&code, &mut outbox);
        Ok(outbox)
    }

    /// Switch the session to another game (or back to the lobby).
    pub fn select_game(
        &mut self,
        connection: ConnectionId,
        code: &str,
        game_type: GameType,
        now: Instant,
    ) -> Result<Outbox, ServiceError> {
        let (code, actor) = self.member(connection, code)?;
        let session = self
            .sessions
            .get_mut(&code)
            .ok_or_else(|| ServiceError::NotFound(code.to_string()))?;
        if !session.is_host(actor) {
            return Err(ServiceError::Forbidden("only the host can select a game".into()));
        }

        let mut outbox = Outbox::new();
        let key = TimerKey::game(&code);
        if self.timers.cancel(&key) {
            outbox.stop_timer(key.clone());
        }

        session.touch(now);
        session.game = None;
        let mut ctx = GameContext {
            players: &session.players,
            host_id: session.host_id,
            config: &self.config,
            rng: &mut self.rng,
        };
        let step = match GameState::start(game_type, &mut ctx) {
            Some((game, step)) => {
                session.game = Some(game);
                step
            }
            None => Step::none(),
        };
        info!(code = %code, game = ?game_type, "game selected");

        self.apply_timer(&code, step.timer, &mut outbox);
        if let Some(session) = self.sessions.get(&code) {
            let game_state = session
                .game
                .as_ref()
                .map(|game| game.view(self.timers.get(&key)));
            outbox.broadcast(
                session.connected_ids(),
                ServerMessage::GameSelected {
                    game_type,
                    game_state,
                },
            );
        }
        self.emit(
            &code,
            Step {
                changed: false,
                ..step
            },
            None,
            &mut outbox,
        );
        Ok(outbox)
    }

    /// Route a game action to the active game.
    pub fn submit_action(
        &mut self,
        connection: ConnectionId,
        code: &str,
        action: GameAction,
        now: Instant,
    ) -> Result<Outbox, ServiceError> {
        let (code, actor) = self.member(connection, code)?;
        if action.is_host_only()
            && !self
                .sessions
                .get(&code)
                .is_some_and(|session| session.is_host(actor))
        {
            return Err(ServiceError::Forbidden(
                "only the host can perform this action".into(),
            ));
        }
        let step = self
            .with_game(&code, |game, ctx| game.handle(ctx, actor, action))
            .ok_or_else(|| ServiceError::InvalidPhase("no game is running".into()))??;

        if let Some(session) = self.sessions.get_mut(&code) {
            session.touch(now);
        }
        let mut outbox = Outbox::new();
        self.apply_step(&code, step, Some(connection), &mut outbox);
        Ok(outbox)
    }

    /// Deliver one tick of the timer `id` armed for `key`.
    pub fn timer_tick(&mut self, key: &TimerKey, id: TimerId) -> (TickOutcome, Outbox) {
        let outcome = self.timers.tick(key, id);
        let mut outbox = Outbox::new();

        match (outcome.clone(), key.slot) {
            (TickOutcome::Stale, _) | (TickOutcome::Ticked { .. }, TimerSlot::HostGrace) => {}
            (TickOutcome::Ticked { remaining, duration }, TimerSlot::Game) => {
                let events = self
                    .with_game(&key.code, |game, _| game.on_tick(remaining))
                    .unwrap_or_default();
                if let Some(session) = self.sessions.get(&key.code) {
                    let recipients = session.connected_ids();
                    outbox.broadcast(
                        recipients.clone(),
                        ServerMessage::TimerTick {
                            time_remaining: remaining,
                            timer_duration: duration,
                        },
                    );
                    for event in events {
                        outbox.broadcast(recipients.clone(), event);
                    }
                }
            }
            (TickOutcome::Expired { phase }, TimerSlot::Game) => {
                let current = self
                    .sessions
                    .get(&key.code)
                    .and_then(|session| session.game.as_ref())
                    .map(GameState::phase_name);
                if current == Some(phase) {
                    info!(code = %key.code, phase, "phase timer expired");
                    if let Some(step) = self.with_game(&key.code, |game, ctx| game.on_expire(ctx))
                    {
                        self.apply_step(&key.code, step, None, &mut outbox);
                    }
                } else {
                    debug!(code = %key.code, phase, ?current, "ignoring expiry for a phase that already ended");
                }
            }
            (TickOutcome::Expired { .. }, TimerSlot::HostGrace) => {
                self.host_grace_expired(&key.code, &mut outbox);
            }
        }
        (outcome, outbox)
    }

    /// Close every session idle for longer than the configured timeout.
    pub fn sweep_inactive(&mut self, now: Instant) -> Outbox {
        let timeout = self.config.inactivity_timeout;
        let expired: Vec<SessionCode> = self
            .sessions
            .values()
            .filter(|session| now.saturating_duration_since(session.last_activity) >= timeout)
            .map(|session| session.code.clone())
            .collect();

        let mut outbox = Outbox::new();
        for code in &expired {
            let Some(session) = self.sessions.get(code) else {
                continue;
            };
            let recipients = session.connected_ids();
            outbox.broadcast(
                recipients.clone(),
                ServerMessage::from(&ServiceError::Expired),
            );
            outbox.broadcast(
                recipients,
                ServerMessage::SessionClosed {
                    code: code.clone(),
                    reason: CloseReason::Expired,
                },
            );
            self.destroy_session(code, &mut outbox);
        }
        if !expired.is_empty() {
            info!(swept = expired.len(), remaining = self.sessions.len(), "inactive sessions swept");
        }
        outbox
    }

    /// Check that `connection` may search on behalf of `code`, refreshing its activity.
    pub fn authorize_search(
        &mut self,
        connection: ConnectionId,
        code: &str,
        now: Instant,
    ) -> Result<SessionCode, ServiceError> {
        let (code, _) = self.member(connection, code)?;
        if let Some(session) = self.sessions.get_mut(&code) {
            session.touch(now);
        }
        Ok(code)
    }

    /// Hand a finished search back to the requester if it is still in the session.
    pub fn deliver_search_results(
        &self,
        connection: ConnectionId,
        code: &SessionCode,
        query: String,
        result: Result<Vec<Track>, ServiceError>,
    ) -> Outbox {
        let mut outbox = Outbox::new();
        if self.memberships.get(&connection) != Some(code) {
            debug!(code = %code, connection_id = %connection, "dropping search results for a departed connection");
            return outbox;
        }
        let message = match result {
            Ok(tracks) => ServerMessage::TrackResults { query, tracks },
            Err(err) => ServerMessage::from(&err),
        };
        outbox.unicast(connection, message);
        outbox
    }

    /// Sanitized view of a session.
    pub fn snapshot(&self, code: &SessionCode) -> Option<SessionSnapshot> {
        let session = self.sessions.get(code)?;
        let players = session
            .players
            .iter()
            .map(|player| PlayerSummary::from_player(player, session.host_id))
            .collect();
        let game_state = session
            .game
            .as_ref()
            .map(|game| game.view(self.timers.get(&TimerKey::game(code))));
        Some(SessionSnapshot::new(
            session.code.clone(),
            session.host_id,
            players,
            session.game_type(),
            game_state,
            session.created_at,
        ))
    }

    fn generate_code(&mut self) -> Result<SessionCode, ServiceError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = SessionCode::random(&mut self.rng);
            if !self.sessions.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(ServiceError::CapacityExceeded)
    }

    /// Resolve the acting player for a session-scoped request.
    fn member(
        &self,
        connection: ConnectionId,
        code: &str,
    ) -> Result<(SessionCode, PlayerId), ServiceError> {
        let code = SessionCode::parse(code);
        if !self.sessions.contains_key(&code) {
            return Err(ServiceError::NotFound(code.to_string()));
        }
        if self.memberships.get(&connection) != Some(&code) {
            return Err(ServiceError::Forbidden(
                "connection is not a member of this session".into(),
            ));
        }
        Ok((code, connection))
    }

    /// Run `f` against the active game with a context built from the session.
    pub(super) fn with_game<T>(
        &mut self,
        code: &SessionCode,
        f: impl FnOnce(&mut GameState, &mut GameContext<'_>) -> T,
    ) -> Option<T> {
        let session = self.sessions.get_mut(code)?;
        let game = session.game.as_mut()?;
        let mut ctx = GameContext {
            players: &session.players,
            host_id: session.host_id,
            config: &self.config,
            rng: &mut self.rng,
        };
        Some(f(game, &mut ctx))
    }

    /// Apply a step: timer first, then one snapshot, then events, then the private reply.
    pub(super) fn apply_step(
        &mut self,
        code: &SessionCode,
        step: Step,
        actor: Option<ConnectionId>,
        outbox: &mut Outbox,
    ) {
        self.apply_timer(code, step.timer, outbox);
        self.emit(code, step, actor, outbox);
    }

    fn apply_timer(&mut self, code: &SessionCode, request: TimerRequest, outbox: &mut Outbox) {
        let key = TimerKey::game(code);
        match request {
            TimerRequest::Keep => {}
            TimerRequest::Arm(ticks) => {
                let phase = self
                    .sessions
                    .get(code)
                    .and_then(|session| session.game.as_ref())
                    .map(GameState::phase_name)
                    .unwrap_or("lobby");
                let id = self.timers.arm(key.clone(), ticks, phase);
                outbox.start_timer(key, id);
            }
            TimerRequest::Cancel => {
                if self.timers.cancel(&key) {
                    outbox.stop_timer(key);
                }
            }
        }
    }

    fn emit(
        &self,
        code: &SessionCode,
        step: Step,
        actor: Option<ConnectionId>,
        outbox: &mut Outbox,
    ) {
        let Some(session) = self.sessions.get(code) else {
            return;
        };
        let recipients = session.connected_ids();
        if step.changed
            && let Some(game) = &session.game
        {
            outbox.broadcast(
                recipients.clone(),
                ServerMessage::PhaseChanged {
                    game_state: game.view(self.timers.get(&TimerKey::game(code))),
                },
            );
        }
        for event in step.events {
            outbox.broadcast(recipients.clone(), event);
        }
        if let (Some(actor), Some(reply)) = (actor, step.reply) {
            outbox.unicast(actor, reply);
        }
    }

    /// Broadcast the player list, then let the game react to the new roster.
    pub(super) fn roster_changed(&mut self, code: &SessionCode, outbox: &mut Outbox) {
        self.broadcast_players(code, outbox);
        if let Some(step) = self.with_game(code, |game, ctx| game.on_roster_change(ctx)) {
            self.apply_step(code, step, None, outbox);
        }
    }

    pub(super) fn broadcast_players(&self, code: &SessionCode, outbox: &mut Outbox) {
        let Some(session) = self.sessions.get(code) else {
            return;
        };
        outbox.broadcast(
            session.connected_ids(),
            ServerMessage::PlayerListUpdated {
                players: session
                    .players
                    .iter()
                    .map(|player| PlayerSummary::from_player(player, session.host_id))
                    .collect(),
                host_id: session.host_id,
            },
        );
    }
}
