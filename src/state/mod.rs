pub mod games;
pub mod lifecycle;
/// Side effects returned by registry operations.
pub mod outbox;
pub mod phase;
pub mod registry;
/// Session and player records.
pub mod session;
pub mod timer;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::{sync::Mutex, sync::mpsc, task::AbortHandle};
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    services::track_search::TrackSearch,
    state::{
        outbox::{Outbox, TimerCommand},
        registry::SessionRegistry,
        session::ConnectionId,
        timer::{TimerId, TimerKey},
    },
};

/// State shared by every handler and background task.
pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push frames to a connected player.
pub struct ConnectionHandle {
    /// Connection the handle belongs to.
    pub id: ConnectionId,
    /// Outbound queue drained by the socket writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Spawned ticker task driving one armed countdown.
pub struct ArmedTicker {
    /// Arm the task was spawned for.
    pub id: TimerId,
    /// Handle used to stop the ticker.
    pub task: AbortHandle,
}

/// Central application state: the session registry and the runtime handles around it.
pub struct AppState {
    config: Arc<AppConfig>,
    /// Sequential queue: every session mutation happens while holding this lock.
    registry: Mutex<SessionRegistry>,
    connections: DashMap<ConnectionId, ConnectionHandle>,
    tickers: DashMap<TimerKey, ArmedTicker>,
    track_search: Arc<dyn TrackSearch>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, track_search: Arc<dyn TrackSearch>) -> SharedState {
        let config = Arc::new(config);
        let registry = SessionRegistry::new(config.clone());
        Self::with_registry(config, registry, track_search)
    }

    /// Build the state around an existing registry (deterministic seeds in tests).
    pub fn with_registry(
        config: Arc<AppConfig>,
        registry: SessionRegistry,
        track_search: Arc<dyn TrackSearch>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            registry: Mutex::new(registry),
            connections: DashMap::new(),
            tickers: DashMap::new(),
            track_search,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The registry behind its sequential lock.
    pub fn registry(&self) -> &Mutex<SessionRegistry> {
        &self.registry
    }

    /// Open player connections keyed by id.
    pub fn connections(&self) -> &DashMap<ConnectionId, ConnectionHandle> {
        &self.connections
    }

    /// Live ticker tasks keyed by countdown.
    pub fn tickers(&self) -> &DashMap<TimerKey, ArmedTicker> {
        &self.tickers
    }

    /// External track search collaborator.
    pub fn track_search(&self) -> Arc<dyn TrackSearch> {
        self.track_search.clone()
    }

    /// Push every delivery of `outbox` to its recipients and hand back the timer commands.
    ///
    /// Must be called while the registry lock is held so frames keep mutation order.
    pub fn deliver(&self, outbox: Outbox) -> Vec<TimerCommand> {
        for delivery in outbox.deliveries {
            let payload = match serde_json::to_string(&delivery.message) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, message = ?delivery.message, "failed to serialize outbound message");
                    continue;
                }
            };
            for recipient in delivery.recipients {
                let Some(connection) = self.connections.get(&recipient) else {
                    debug!(connection_id = %recipient, "recipient no longer connected");
                    continue;
                };
                if connection
                    .tx
                    .send(Message::Text(payload.clone().into()))
                    .is_err()
                {
                    debug!(connection_id = %recipient, "writer closed; frame dropped");
                }
            }
        }
        outbox.timers
    }

    /// Replace the ticker registered for `key`, aborting the previous one.
    pub fn install_ticker(&self, key: TimerKey, ticker: ArmedTicker) {
        if let Some(previous) = self.tickers.insert(key, ticker) {
            previous.task.abort();
        }
    }

    /// Abort and forget the ticker for `key`.
    pub fn abort_ticker(&self, key: &TimerKey) {
        if let Some((_, ticker)) = self.tickers.remove(key) {
            ticker.task.abort();
        }
    }

    /// Forget the ticker for `key` if it is still the one started for `id`.
    pub fn release_ticker(&self, key: &TimerKey, id: TimerId) {
        self.tickers.remove_if(key, |_, ticker| ticker.id == id);
    }
}
