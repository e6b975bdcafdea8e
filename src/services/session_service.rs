//! Bridges connection events into the session registry and applies the resulting outbox.
//!
//! Every registry call happens while holding the registry lock, and the produced frames
//! are pushed to the writer channels before the lock is released.

use std::time::Instant;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::timer_service,
    state::{
        ConnectionHandle, SharedState,
        outbox::{Outbox, TimerCommand},
        session::ConnectionId,
    },
};

/// Register a new connection and greet it with its id.
pub async fn open_connection(
    state: &SharedState,
    tx: mpsc::UnboundedSender<Message>,
) -> ConnectionId {
    let id = Uuid::new_v4();
    state
        .connections()
        .insert(id, ConnectionHandle { id, tx });

    let _registry = state.registry().lock().await;
    let mut outbox = Outbox::new();
    outbox.unicast(id, ServerMessage::Connected { connection_id: id });
    apply(state, outbox);
    info!(connection_id = %id, "player connected");
    id
}

/// Treat the connection as gone: release its seat and forget its writer.
pub async fn close_connection(state: &SharedState, connection: ConnectionId) {
    {
        let mut registry = state.registry().lock().await;
        let outbox = registry.disconnect(connection, Instant::now());
        apply(state, outbox);
    }
    state.connections().remove(&connection);
    info!(connection_id = %connection, "player disconnected");
}

/// Process one decoded client message.
pub async fn handle_message(state: &SharedState, connection: ConnectionId, message: ClientMessage) {
    let kind = message.kind();
    debug!(connection_id = %connection, kind, "client message");
    let now = Instant::now();

    if let ClientMessage::SearchTracks { code, query } = message {
        search_tracks(state, connection, code, query).await;
        return;
    }

    let mut registry = state.registry().lock().await;
    let result = match message {
        ClientMessage::CreateSession { display_name } => {
            registry.create_session(connection, &display_name, now)
        }
        ClientMessage::JoinSession { code, display_name } => {
            registry.join_session(connection, &code, &display_name, now)
        }
        ClientMessage::LeaveSession => Ok(registry.leave_session(connection, now)),
        ClientMessage::SelectGame { code, game_type } => {
            registry.select_game(connection, &code, game_type, now)
        }
        ClientMessage::TransferHost { code, new_host_id } => {
            registry.transfer_host(connection, &code, new_host_id, now)
        }
        ClientMessage::SubmitAction { code, action } => {
            registry.submit_action(connection, &code, action, now)
        }
        ClientMessage::SearchTracks { .. } => return,
    };

    match result {
        Ok(outbox) => apply(state, outbox),
        Err(err) => {
            debug!(connection_id = %connection, kind, error = %err, "request rejected");
            apply(state, rejection(connection, &err));
        }
    }
}

/// Tell a connection its request was rejected without touching any session.
pub async fn report_error(state: &SharedState, connection: ConnectionId, err: &ServiceError) {
    let _registry = state.registry().lock().await;
    apply(state, rejection(connection, err));
}

/// Run a track search outside the registry lock and hand the result back to the requester.
async fn search_tracks(state: &SharedState, connection: ConnectionId, code: String, query: String) {
    let code = {
        let mut registry = state.registry().lock().await;
        match registry.authorize_search(connection, &code, Instant::now()) {
            Ok(code) => code,
            Err(err) => {
                apply(state, rejection(connection, &err));
                return;
            }
        }
    };

    let pending = state.track_search().search(&query);
    let state = state.clone();
    tokio::spawn(async move {
        let result = pending.await.map_err(|err| {
            warn!(code = %code, error = %err, "track search failed");
            ServiceError::from(err)
        });
        let registry = state.registry().lock().await;
        let outbox = registry.deliver_search_results(connection, &code, query, result);
        apply(&state, outbox);
    });
}

/// Close sessions idle for too long.
pub async fn sweep_inactive(state: &SharedState) {
    let mut registry = state.registry().lock().await;
    let outbox = registry.sweep_inactive(Instant::now());
    apply(state, outbox);
}

fn rejection(connection: ConnectionId, err: &ServiceError) -> Outbox {
    let mut outbox = Outbox::new();
    outbox.unicast(connection, ServerMessage::from(err));
    outbox
}

/// Push deliveries and reconcile ticker tasks. Callers must hold the registry lock.
pub(crate) fn apply(state: &SharedState, outbox: Outbox) {
    for command in state.deliver(outbox) {
        match command {
            TimerCommand::Start { key, id } => timer_service::start_ticker(state, key, id),
            TimerCommand::Stop { key } => state.abort_ticker(&key),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use futures::future::BoxFuture;
    use serde_json::Value;

    use super::*;
    use crate::{
        config::AppConfig,
        dto::search::Track,
        services::track_search::{SearchError, TrackSearch},
        state::{AppState, registry::SessionRegistry, session::GameType},
    };

    struct StaticSearch;

    impl TrackSearch for StaticSearch {
        fn search(&self, query: &str) -> BoxFuture<'static, Result<Vec<Track>, SearchError>> {
            let tracks = if query == "broken" {
                Err(SearchError::Timeout)
            } else {
                Ok(vec![Track {
                    id: "1".into(),
                    title: format!("{query} (live)"),
                    artist: "Band".into(),
                    preview_url: None,
                    album_art_url: None,
                }])
            };
            Box::pin(async move { tracks })
        }
    }

    fn test_state() -> SharedState {
        let config = Arc::new(AppConfig::default());
        let registry = SessionRegistry::with_seed(config.clone(), 3);
        AppState::with_registry(config, registry, Arc::new(StaticSearch))
    }

    async fn connect(state: &SharedState) -> (ConnectionId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = open_connection(state, tx).await;
        (id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                frames.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        frames
    }

    fn of_type<'a>(frames: &'a [Value], kind: &str) -> Vec<&'a Value> {
        frames.iter().filter(|frame| frame["type"] == kind).collect()
    }

    async fn lobby(
        state: &SharedState,
    ) -> (
        String,
        (ConnectionId, mpsc::UnboundedReceiver<Message>),
        (ConnectionId, mpsc::UnboundedReceiver<Message>),
    ) {
        let (alice, mut alice_rx) = connect(state).await;
        handle_message(
            state,
            alice,
            ClientMessage::CreateSession {
                display_name: "Alice".into(),
            },
        )
        .await;
        let frames = drain(&mut alice_rx);
        let code = of_type(&frames, "session_created")[0]["session"]["code"]
            .as_str()
            .unwrap()
            .to_string();

        let (bob, mut bob_rx) = connect(state).await;
        handle_message(
            state,
            bob,
            ClientMessage::JoinSession {
                code: code.clone(),
                display_name: "Bob".into(),
            },
        )
        .await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);
        (code, (alice, alice_rx), (bob, bob_rx))
    }

    #[tokio::test]
    async fn connection_is_greeted_with_its_id() {
        let state = test_state();
        let (id, mut rx) = connect(&state).await;
        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "connected");
        assert_eq!(frames[0]["connection_id"], id.to_string());
    }

    #[tokio::test]
    async fn rejected_requests_only_reach_the_sender() {
        let state = test_state();
        let (code, (_alice, mut alice_rx), (bob, mut bob_rx)) = lobby(&state).await;

        handle_message(
            &state,
            bob,
            ClientMessage::SelectGame {
                code,
                game_type: GameType::Wheel,
            },
        )
        .await;

        let frames = drain(&mut bob_rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["code"], "forbidden");
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_drive_the_duel_into_negotiation() {
        let state = test_state();
        let (code, (alice, mut alice_rx), (_bob, mut bob_rx)) = lobby(&state).await;

        handle_message(
            &state,
            alice,
            ClientMessage::SelectGame {
                code,
                game_type: GameType::Duel,
            },
        )
        .await;
        let frames = drain(&mut alice_rx);
        assert_eq!(of_type(&frames, "game_selected")[0]["game_state"]["phase"], "countdown");
        assert_eq!(state.tickers().len(), 1);

        tokio::time::sleep(Duration::from_millis(3_500)).await;

        let frames = drain(&mut bob_rx);
        let ticks = of_type(&frames, "timer_tick");
        assert!(!ticks.is_empty());
        assert_eq!(ticks[0]["timer_duration"], 3);
        let phases: Vec<&Value> = of_type(&frames, "phase_changed")
            .into_iter()
            .map(|frame| &frame["game_state"]["phase"])
            .collect();
        assert_eq!(phases.last().copied(), Some(&Value::from("negotiation")));
        assert_eq!(state.tickers().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_the_lobby_stops_the_game_ticker() {
        let state = test_state();
        let (code, (alice, _alice_rx), (bob, _bob_rx)) = lobby(&state).await;
        handle_message(
            &state,
            alice,
            ClientMessage::SelectGame {
                code,
                game_type: GameType::Duel,
            },
        )
        .await;
        assert_eq!(state.tickers().len(), 1);

        handle_message(&state, bob, ClientMessage::LeaveSession).await;
        handle_message(&state, alice, ClientMessage::LeaveSession).await;
        assert!(state.tickers().is_empty());
        assert_eq!(state.registry().lock().await.session_count(), 0);
    }

    #[tokio::test]
    async fn search_results_return_to_the_requester() {
        let state = test_state();
        let (code, (alice, mut alice_rx), (_bob, mut bob_rx)) = lobby(&state).await;

        handle_message(
            &state,
            alice,
            ClientMessage::SearchTracks {
                code: code.clone(),
                query: "song".into(),
            },
        )
        .await;
        handle_message(
            &state,
            alice,
            ClientMessage::SearchTracks {
                code,
                query: "broken".into(),
            },
        )
        .await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let frames = drain(&mut alice_rx);
        let results = of_type(&frames, "track_results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["tracks"][0]["title"], "song (live)");
        assert_eq!(of_type(&frames, "error")[0]["code"], "upstream_unavailable");
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn closing_a_connection_releases_its_seat() {
        let state = test_state();
        let (code, (_alice, mut alice_rx), (bob, _bob_rx)) = lobby(&state).await;

        close_connection(&state, bob).await;

        assert!(!state.connections().contains_key(&bob));
        let frames = drain(&mut alice_rx);
        let roster = of_type(&frames, "player_list_updated");
        assert_eq!(roster.last().unwrap()["players"].as_array().unwrap().len(), 1);
        let registry = state.registry().lock().await;
        let snapshot = registry
            .snapshot(&crate::state::session::SessionCode::parse(&code))
            .unwrap();
        assert_eq!(snapshot.players.len(), 1);
    }
}
