use std::{
    fmt,
    time::{Instant, SystemTime},
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::phase::GameState;

/// Identity of a transport connection.
pub type ConnectionId = Uuid;
/// Identity of a player; always the id of the player's current connection.
pub type PlayerId = Uuid;

/// Characters used in session codes (no `0/O`, `1/I/L`).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
/// Number of characters in a generated session code.
pub const CODE_LENGTH: usize = 5;

/// Short human-typeable session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Draw a random code from [`CODE_ALPHABET`].
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..CODE_LENGTH)
            .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    /// Normalise user input (trim + uppercase) into a code.
    pub fn parse(input: &str) -> Self {
        Self(input.trim().to_ascii_uppercase())
    }

    /// Borrow the textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Game currently running in a session; `None` is the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    /// Lobby, no game running.
    None,
    /// Duel game.
    Duel,
    /// Wheel game.
    Wheel,
    /// Statements game.
    Statements,
}

/// A seat in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Id of the connection currently attached to this seat.
    pub id: PlayerId,
    /// Case-sensitive display name, unique within the session.
    pub display_name: String,
    /// Set while the host's seat is held during the grace window.
    pub disconnected: bool,
}

impl Player {
    /// Create a connected player.
    pub fn new(id: PlayerId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            disconnected: false,
        }
    }
}

/// Canonical per-session record owned by the registry.
pub struct Session {
    /// Unique session code.
    pub code: SessionCode,
    /// Players in join order.
    pub players: Vec<Player>,
    /// Current host, always one of `players`.
    pub host_id: PlayerId,
    /// Active game, `None` while in the lobby.
    pub game: Option<GameState>,
    /// Wall-clock creation time, reported in snapshots.
    pub created_at: SystemTime,
    /// Refreshed by every accepted operation; drives the sweep.
    pub last_activity: Instant,
}

impl Session {
    /// Create a session whose only player is the host.
    pub fn new(code: SessionCode, host: Player, now: Instant) -> Self {
        let host_id = host.id;
        Self {
            code,
            players: vec![host],
            host_id,
            game: None,
            created_at: SystemTime::now(),
            last_activity: now,
        }
    }

    /// Game type currently selected.
    pub fn game_type(&self) -> GameType {
        self.game
            .as_ref()
            .map(GameState::game_type)
            .unwrap_or(GameType::None)
    }

    /// Look up a player by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Look up a player by exact display name.
    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players
            .iter()
            .find(|player| player.display_name == name)
    }

    /// Whether `id` is the current host.
    pub fn is_host(&self, id: PlayerId) -> bool {
        self.host_id == id
    }

    /// Ids of the players whose connection is attached, i.e. the delivery group.
    pub fn connected_ids(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|player| !player.disconnected)
            .map(|player| player.id)
            .collect()
    }

    /// Refresh the inactivity clock.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }
}

/// Seat held for a disconnected host during the grace window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectedHost {
    /// Player id the host had when the connection dropped.
    pub host_id: PlayerId,
    /// Display name the seat is reserved for.
    pub host_name: String,
    /// When the connection dropped.
    pub disconnected_at: Instant,
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn random_codes_use_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let code = SessionCode::random(&mut rng);
            assert_eq!(code.as_str().len(), CODE_LENGTH);
            assert!(code.as_str().bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.as_str().contains(['0', 'O', '1', 'I', 'L']));
        }
    }

    #[test]
    fn parse_normalises_user_input() {
        assert_eq!(SessionCode::parse("  abcde ").as_str(), "ABCDE");
    }
}
