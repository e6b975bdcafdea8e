use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        game::{DuelAction, GameAction, GameStateView, StatementsAction},
        search::Track,
        session::{PlayerSummary, SessionSnapshot},
        validation::{validate_display_name, validate_query, validate_session_code, validate_text},
    },
    error::{ErrorCode, ServiceError},
    state::session::{ConnectionId, GameType, PlayerId, SessionCode},
};

/// Messages accepted from player WebSocket clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a new session hosted by this connection.
    CreateSession {
        /// Name shown to the other players.
        display_name: String,
    },
    /// Join an existing session, or take back a seat held after a drop.
    JoinSession {
        /// Session code, case-insensitive.
        code: String,
        /// Name shown to the other players.
        display_name: String,
    },
    /// Leave the current session.
    LeaveSession,
    /// Host picks the game to play.
    SelectGame {
        /// Target session.
        code: String,
        /// Game to start.
        game_type: GameType,
    },
    /// Host hands the role to another player.
    TransferHost {
        /// Target session.
        code: String,
        /// Player receiving the host role.
        new_host_id: PlayerId,
    },
    /// Action for the running game.
    SubmitAction {
        /// Target session.
        code: String,
        /// Game-specific payload.
        action: GameAction,
    },
    /// Look up tracks on behalf of the session.
    SearchTracks {
        /// Target session.
        code: String,
        /// Free-text search terms.
        query: String,
    },
}

impl ClientMessage {
    /// Parse a text frame and validate its fields.
    pub fn from_json_str(payload: &str) -> Result<Self, ServiceError> {
        let message: Self = serde_json::from_str(payload)
            .map_err(|err| ServiceError::InvalidInput(format!("malformed message: {err}")))?;
        message
            .validate()
            .map_err(|err| ServiceError::InvalidInput(format!("validation failed: {err}")))?;
        Ok(message)
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::CreateSession { .. } => "create_session",
            ClientMessage::JoinSession { .. } => "join_session",
            ClientMessage::LeaveSession => "leave_session",
            ClientMessage::SelectGame { .. } => "select_game",
            ClientMessage::TransferHost { .. } => "transfer_host",
            ClientMessage::SubmitAction { .. } => "submit_action",
            ClientMessage::SearchTracks { .. } => "search_tracks",
        }
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let code = match self {
            ClientMessage::JoinSession { code, .. }
            | ClientMessage::SelectGame { code, .. }
            | ClientMessage::TransferHost { code, .. }
            | ClientMessage::SubmitAction { code, .. }
            | ClientMessage::SearchTracks { code, .. } => Some(code),
            ClientMessage::CreateSession { .. } | ClientMessage::LeaveSession => None,
        };
        if let Some(code) = code
            && let Err(e) = validate_session_code(code)
        {
            errors.add("code", e);
        }

        match self {
            ClientMessage::CreateSession { display_name }
            | ClientMessage::JoinSession { display_name, .. } => {
                if let Err(e) = validate_display_name(display_name) {
                    errors.add("display_name", e);
                }
            }
            ClientMessage::SearchTracks { query, .. } => {
                if let Err(e) = validate_query(query) {
                    errors.add("query", e);
                }
            }
            ClientMessage::SubmitAction { action, .. } => match action {
                GameAction::Duel(DuelAction::Negotiate { message }) => {
                    if let Err(e) = validate_text(message) {
                        errors.add("message", e);
                    }
                }
                GameAction::Statements(StatementsAction::Submit { text }) => {
                    if let Err(e) = validate_text(text) {
                        errors.add("text", e);
                    }
                }
                _ => {}
            },
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Why a session stopped existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Swept after the inactivity timeout.
    Expired,
}

/// Messages pushed to player WebSocket clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame of every connection.
    Connected {
        /// Id assigned to this connection, also used as player id.
        connection_id: ConnectionId,
    },
    /// Reply to the creator of a new session.
    SessionCreated {
        /// Player id of the creator, who is the host.
        player_id: PlayerId,
        /// Session as it stands after creation.
        session: SessionSnapshot,
    },
    /// Reply to a successful join.
    SessionJoined {
        /// Player id of the joiner.
        player_id: PlayerId,
        /// Session as it stands after the join.
        session: SessionSnapshot,
        /// True when the connection took over an existing seat.
        reconnected: bool,
    },
    /// Acknowledges an explicit leave to the leaving connection.
    SessionLeft {
        /// Session that was left.
        code: SessionCode,
    },
    /// Session was removed while this player was in it.
    SessionClosed {
        /// Removed session.
        code: SessionCode,
        /// Why it was removed.
        reason: CloseReason,
    },
    /// Membership changed.
    PlayerListUpdated {
        /// Current players in join order.
        players: Vec<PlayerSummary>,
        /// Current host.
        host_id: PlayerId,
    },
    /// Host started a game.
    GameSelected {
        /// Selected game.
        game_type: GameType,
        /// Initial game state, absent when the game has no state yet.
        #[serde(skip_serializing_if = "Option::is_none")]
        game_state: Option<GameStateView>,
    },
    /// Running game moved to another phase.
    PhaseChanged {
        /// Game state after the transition.
        game_state: GameStateView,
    },
    /// One second elapsed on the active countdown.
    TimerTick {
        /// Seconds left.
        time_remaining: u32,
        /// Seconds the countdown started with.
        timer_duration: u32,
    },
    /// Host role moved to another player.
    HostChanged {
        /// New host.
        host_id: PlayerId,
        /// Host before the change.
        previous_host_id: PlayerId,
    },
    /// A duelist's message during negotiation.
    NegotiationMessage {
        /// Sending duelist.
        from: PlayerId,
        /// Name of the sender.
        display_name: String,
        /// Message text.
        message: String,
    },
    /// Private acknowledgement of an accepted game action.
    ActionAccepted,
    /// Reply to a track search.
    TrackResults {
        /// Query as received.
        query: String,
        /// Matching tracks, possibly none.
        tracks: Vec<Track>,
    },
    /// Request was rejected.
    Error {
        /// Stable error identifier.
        code: ErrorCode,
        /// Human-readable description.
        message: String,
    },
}

impl From<&ServiceError> for ServerMessage {
    fn from(err: &ServiceError) -> Self {
        ServerMessage::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_request() {
        let message = ClientMessage::from_json_str(
            r#"{ "type": "join_session", "code": "abcde", "display_name": "Bob" }"#,
        )
        .unwrap();
        assert_eq!(
            message,
            ClientMessage::JoinSession {
                code: "abcde".into(),
                display_name: "Bob".into()
            }
        );
    }

    #[test]
    fn parses_unit_and_nested_variants() {
        let leave = ClientMessage::from_json_str(r#"{ "type": "leave_session" }"#).unwrap();
        assert_eq!(leave, ClientMessage::LeaveSession);

        let submit = ClientMessage::from_json_str(
            r#"{ "type": "submit_action", "code": "ABCDE",
                 "action": { "game": "statements", "kind": "submit", "text": "I can juggle" } }"#,
        )
        .unwrap();
        assert_eq!(submit.kind(), "submit_action");
    }

    #[test]
    fn rejects_invalid_fields() {
        let err = ClientMessage::from_json_str(
            r#"{ "type": "create_session", "display_name": "   " }"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);

        let err = ClientMessage::from_json_str(
            r#"{ "type": "join_session", "code": "A!", "display_name": "Bob" }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err = ClientMessage::from_json_str(r#"{ "type": "dance" }"#).unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn error_frames_carry_code() {
        let frame = ServerMessage::from(&ServiceError::NameTaken("Bob".into()));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "name_taken");
    }
}
