use crate::{
    dto::ws::ServerMessage,
    state::{
        session::ConnectionId,
        timer::{TimerId, TimerKey},
    },
};

/// A message and the connections it must reach, resolved when it was emitted.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Connections to reach.
    pub recipients: Vec<ConnectionId>,
    /// Frame to send.
    pub message: ServerMessage,
}

/// Instruction for the runtime ticker tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    /// Spawn (or replace) the ticker for `key`.
    Start {
        /// Countdown to drive.
        key: TimerKey,
        /// Arm the ticker reports back with.
        id: TimerId,
    },
    /// Abort the ticker for `key`.
    Stop {
        /// Countdown whose ticker must stop.
        key: TimerKey,
    },
}

/// Side effects produced by a registry operation, applied by the runtime in order.
#[derive(Debug, Default)]
pub struct Outbox {
    /// Messages in emission order.
    pub deliveries: Vec<Delivery>,
    /// Ticker changes in emission order.
    pub timers: Vec<TimerCommand>,
}

impl Outbox {
    /// Empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for a single connection.
    pub fn unicast(&mut self, to: ConnectionId, message: ServerMessage) {
        self.deliveries.push(Delivery {
            recipients: vec![to],
            message,
        });
    }

    /// Queue a message for a group of connections.
    pub fn broadcast(&mut self, recipients: Vec<ConnectionId>, message: ServerMessage) {
        if recipients.is_empty() {
            return;
        }
        self.deliveries.push(Delivery {
            recipients,
            message,
        });
    }

    /// Queue a ticker start.
    pub fn start_timer(&mut self, key: TimerKey, id: TimerId) {
        self.timers.push(TimerCommand::Start { key, id });
    }

    /// Queue a ticker stop.
    pub fn stop_timer(&mut self, key: TimerKey) {
        self.timers.push(TimerCommand::Stop { key });
    }

    /// Whether nothing needs to be delivered or scheduled.
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty() && self.timers.is_empty()
    }

    /// Messages delivered to `connection`, in order.
    pub fn messages_for(&self, connection: ConnectionId) -> Vec<&ServerMessage> {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.recipients.contains(&connection))
            .map(|delivery| &delivery.message)
            .collect()
    }
}
