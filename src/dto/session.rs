use serde::Serialize;

use crate::{
    dto::{format_system_time, game::GameStateView},
    state::session::{GameType, Player, PlayerId, SessionCode},
};

/// Sanitized session view: no timer handles, no internal game history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Session code.
    pub code: SessionCode,
    /// Current host.
    pub host_id: PlayerId,
    /// Players in join order.
    pub players: Vec<PlayerSummary>,
    /// Running game, `none` in the lobby.
    pub game_type: GameType,
    /// Present while a game is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_state: Option<GameStateView>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl SessionSnapshot {
    /// Assemble a snapshot from already projected parts.
    pub fn new(
        code: SessionCode,
        host_id: PlayerId,
        players: Vec<PlayerSummary>,
        game_type: GameType,
        game_state: Option<GameStateView>,
        created_at: std::time::SystemTime,
    ) -> Self {
        Self {
            code,
            host_id,
            players,
            game_type,
            game_state,
            created_at: format_system_time(created_at),
        }
    }
}

/// Player entry of the lobby list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    /// Player id.
    pub id: PlayerId,
    /// Name shown in the lobby.
    pub display_name: String,
    /// Seat held for a host who dropped.
    pub disconnected: bool,
    /// Whether this player holds the host role.
    pub is_host: bool,
}

impl PlayerSummary {
    /// Project a player record, flagging the host.
    pub fn from_player(player: &Player, host_id: PlayerId) -> Self {
        Self {
            id: player.id,
            display_name: player.display_name.clone(),
            disconnected: player.disconnected,
            is_host: player.id == host_id,
        }
    }
}
