//! The local representation of a player attached to this instance.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use gridlock_protocol::PlayerId;
use gridlock_store::ConnectionStatus;

use crate::Connection;

struct Presence {
    status: ConnectionStatus,
    last_seen: Instant,
}

/// A player as this instance sees them: identity, a connection handle
/// (synthetic for bots), and local presence.
///
/// Presence is the room's working copy — the store keeps the cluster-
/// visible `connection_status`, this keeps the `last_seen` instant the
/// grace sweep compares against. Shared as `Arc<Player>` between the
/// hub map, the room surrogate, and the reader task.
pub struct Player {
    id: PlayerId,
    conn: Arc<dyn Connection>,
    is_bot: bool,
    presence: Mutex<Presence>,
}

impl Player {
    /// A freshly connected human.
    pub fn new(id: PlayerId, conn: Arc<dyn Connection>) -> Arc<Player> {
        Arc::new(Player {
            id,
            conn,
            is_bot: false,
            presence: Mutex::new(Presence {
                status: ConnectionStatus::Connected,
                last_seen: Instant::now(),
            }),
        })
    }

    /// A bot seat with its pseudo-connection. Bots never disconnect.
    pub fn new_bot(id: PlayerId, conn: Arc<dyn Connection>) -> Arc<Player> {
        Arc::new(Player {
            id,
            conn,
            is_bot: true,
            presence: Mutex::new(Presence {
                status: ConnectionStatus::Connected,
                last_seen: Instant::now(),
            }),
        })
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub fn conn(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    pub fn is_bot(&self) -> bool {
        self.is_bot
    }

    pub fn is_connected(&self) -> bool {
        let presence = self.presence.lock().expect("presence lock");
        presence.status == ConnectionStatus::Connected
    }

    /// Marks the player gone and stamps `last_seen` — the grace window
    /// starts now.
    pub fn mark_disconnected(&self) {
        let mut presence = self.presence.lock().expect("presence lock");
        presence.status = ConnectionStatus::Disconnected;
        presence.last_seen = Instant::now();
    }

    pub fn mark_connected(&self) {
        let mut presence = self.presence.lock().expect("presence lock");
        presence.status = ConnectionStatus::Connected;
        presence.last_seen = Instant::now();
    }

    /// How long the player has been disconnected; `None` while connected.
    pub fn disconnected_for(&self) -> Option<Duration> {
        let presence = self.presence.lock().expect("presence lock");
        match presence.status {
            ConnectionStatus::Connected => None,
            ConnectionStatus::Disconnected => Some(presence.last_seen.elapsed()),
        }
    }
}
