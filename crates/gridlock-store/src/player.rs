//! Per-player session metadata and its store seam.

use async_trait::async_trait;
use gridlock_protocol::{InstanceId, PlayerId, RoomId};

use crate::StoreError;

/// Whether the player's socket is currently attached somewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }

    pub fn parse(s: &str) -> Option<ConnectionStatus> {
        match s {
            "connected" => Some(ConnectionStatus::Connected),
            "disconnected" => Some(ConnectionStatus::Disconnected),
            _ => None,
        }
    }
}

/// Where the player is in the matchmaking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Waiting,
    InGame,
    Offline,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::InGame => "in_game",
            SessionStatus::Offline => "offline",
        }
    }
}

/// What registration needs to know to classify an arriving socket.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconnectInfo {
    /// The room the player was seated in, if any.
    pub room_id: Option<RoomId>,
    /// The recorded connection status, if a record exists at all.
    pub connection: Option<ConnectionStatus>,
}

impl ReconnectInfo {
    /// A registration is a reconnection iff the player has a seat *and*
    /// is recorded as disconnected. Every other combination — no record,
    /// no room, or still marked connected — is a fresh registration.
    pub fn is_reconnection(&self) -> bool {
        self.room_id.is_some() && self.connection == Some(ConnectionStatus::Disconnected)
    }

    /// The room to rejoin, present only when this is a reconnection.
    pub fn reconnection_room(&self) -> Option<&RoomId> {
        if self.is_reconnection() {
            self.room_id.as_ref()
        } else {
            None
        }
    }
}

/// Per-player session metadata. Callers are idempotent; only this seam
/// writes the player hash.
#[async_trait]
pub trait PlayerStore: Send + Sync + 'static {
    /// Reads what registration needs to classify the arrival.
    async fn find_for_reconnect(
        &self,
        player: &PlayerId,
    ) -> Result<ReconnectInfo, StoreError>;

    /// Fresh registration: waiting, connected, no room, homed here.
    async fn set_initial(
        &self,
        player: &PlayerId,
        home: &InstanceId,
    ) -> Result<(), StoreError>;

    /// The matcher seated the player: in-game, connected, room set.
    async fn set_for_match(
        &self,
        player: &PlayerId,
        room: &RoomId,
    ) -> Result<(), StoreError>;

    /// Flips only the connection status (socket drop / reclaim).
    async fn set_connection(
        &self,
        player: &PlayerId,
        status: ConnectionStatus,
    ) -> Result<(), StoreError>;

    /// Unregistration: the player is gone for good (until they return
    /// as a fresh registration).
    async fn set_offline(&self, player: &PlayerId) -> Result<(), StoreError>;
}
