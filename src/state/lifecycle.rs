//! Connection lifecycle: disconnects, held host seats, reconnection by name, removal
//! and host migration.

use std::time::Instant;

use tracing::{info, warn};

use crate::{
    dto::ws::ServerMessage,
    state::{
        outbox::Outbox,
        registry::SessionRegistry,
        session::{ConnectionId, DisconnectedHost, PlayerId, SessionCode},
        timer::TimerKey,
    },
};

/// Phase label recorded on host grace countdowns.
const HOST_GRACE_PHASE: &str = "host_grace";

impl SessionRegistry {
    /// Handle a dropped transport connection.
    ///
    /// A non-host is removed right away. The host keeps a seat flagged `disconnected`
    /// for the grace window, during which a join with the same display name reclaims it.
    pub fn disconnect(&mut self, connection: ConnectionId, now: Instant) -> Outbox {
        let mut outbox = Outbox::new();
        let Some(code) = self.memberships.remove(&connection) else {
            return outbox;
        };
        let Some(session) = self.sessions.get_mut(&code) else {
            return outbox;
        };

        if !session.is_host(connection) {
            info!(code = %code, connection_id = %connection, "player disconnected");
            self.remove_player(&code, connection, &mut outbox);
            return outbox;
        }

        let Some(host) = session
            .players
            .iter_mut()
            .find(|player| player.id == connection)
        else {
            warn!(code = %code, connection_id = %connection, "host record missing on disconnect");
            return outbox;
        };
        host.disconnected = true;
        let host_name = host.display_name.clone();

        self.disconnected_hosts.insert(
            code.clone(),
            DisconnectedHost {
                host_id: connection,
                host_name: host_name.clone(),
                disconnected_at: now,
            },
        );
        let key = TimerKey::host_grace(&code);
        let id = self
            .timers
            .arm(key.clone(), self.config.host_grace_ticks(), HOST_GRACE_PHASE);
        outbox.start_timer(key, id);
        info!(
            code = %code,
            connection_id = %connection,
            player = %host_name,
            grace_secs = self.config.host_grace_secs,
            "host disconnected; seat held"
        );

        self.roster_changed(&code, &mut outbox);
        outbox
    }

    /// Move an existing seat onto a new connection.
    pub(super) fn reattach(
        &mut self,
        code: &SessionCode,
        old: PlayerId,
        connection: ConnectionId,
        now: Instant,
        outbox: &mut Outbox,
    ) {
        let Some(session) = self.sessions.get_mut(code) else {
            return;
        };
        let Some(player) = session.players.iter_mut().find(|player| player.id == old) else {
            return;
        };
        player.id = connection;
        player.disconnected = false;
        if session.host_id == old {
            session.host_id = connection;
        }
        session.touch(now);
        if let Some(game) = session.game.as_mut() {
            game.on_player_reattached(old, connection);
        }

        self.memberships.remove(&old);
        self.memberships.insert(connection, code.clone());

        if let Some(snapshot) = self.snapshot(code) {
            outbox.unicast(
                connection,
                ServerMessage::SessionJoined {
                    player_id: connection,
                    session: snapshot,
                    reconnected: true,
                },
            );
        }
        self.roster_changed(code, outbox);
    }

    /// Remove a seat, migrating the host or tearing the session down as needed.
    pub(super) fn remove_player(&mut self, code: &SessionCode, id: PlayerId, outbox: &mut Outbox) {
        let Some(session) = self.sessions.get_mut(code) else {
            return;
        };
        session.players.retain(|player| player.id != id);

        if session.players.is_empty() {
            self.destroy_session(code, outbox);
            return;
        }

        if session.host_id == id {
            let successor = session.players[0].id;
            session.host_id = successor;
            info!(code = %code, from = %id, to = %successor, "host migrated");
            let recipients = session.connected_ids();
            outbox.broadcast(
                recipients,
                ServerMessage::HostChanged {
                    host_id: successor,
                    previous_host_id: id,
                },
            );
        }

        self.roster_changed(code, outbox);
    }

    /// Remove the held seat once the grace window ran out without a reconnection.
    pub(super) fn host_grace_expired(&mut self, code: &SessionCode, outbox: &mut Outbox) {
        let Some(held) = self.disconnected_hosts.remove(code) else {
            return;
        };
        let still_held = self
            .sessions
            .get(code)
            .and_then(|session| session.player(held.host_id))
            .is_some_and(|player| player.disconnected);
        if !still_held {
            return;
        }
        info!(
            code = %code,
            player = %held.host_name,
            "host grace window expired"
        );
        self.remove_player(code, held.host_id, outbox);
    }

    /// Drop a session with everything attached to it.
    pub(super) fn destroy_session(&mut self, code: &SessionCode, outbox: &mut Outbox) {
        for key in self.timers.cancel_session(code) {
            outbox.stop_timer(key);
        }
        self.disconnected_hosts.remove(code);
        self.memberships.retain(|_, member_of| member_of != code);
        if self.sessions.remove(code).is_some() {
            info!(code = %code, "session destroyed");
        }
    }
}
