//! Key and channel layout in the shared store.
//!
//! Kept in one place so the Redis backend, the subscribers, and any
//! operational tooling agree on the namespace:
//!
//! ```text
//! room:<id>           hash   board/player_x/player_o/next_turn/winner/status + vote:<pid>
//! player:<id>         hash   home_instance/room_id/status/connection_status
//! queue:matchmaking   list   player ids, FIFO
//! channel:events      pub/sub coordination envelopes
//! channel:room:<id>   pub/sub content-free re-read wakes
//! ```

use gridlock_protocol::{PlayerId, RoomId};

/// The single shared matchmaking queue.
pub const MATCHMAKING_QUEUE: &str = "queue:matchmaking";

/// The well-known cluster coordination channel.
pub const EVENTS_CHANNEL: &str = "channel:events";

// Room hash fields.
pub const FIELD_BOARD: &str = "board";
pub const FIELD_PLAYER_X: &str = "player_x";
pub const FIELD_PLAYER_O: &str = "player_o";
pub const FIELD_NEXT_TURN: &str = "next_turn";
pub const FIELD_WINNER: &str = "winner";
pub const FIELD_STATUS: &str = "status";

// Player hash fields.
pub const FIELD_HOME_INSTANCE: &str = "home_instance";
pub const FIELD_ROOM_ID: &str = "room_id";
pub const FIELD_SESSION_STATUS: &str = "status";
pub const FIELD_CONNECTION_STATUS: &str = "connection_status";

/// The hash key of a room record.
pub fn room_key(room: &RoomId) -> String {
    format!("room:{room}")
}

/// The hash key of a player record.
pub fn player_key(player: &PlayerId) -> String {
    format!("player:{player}")
}

/// The per-room wake-up channel.
pub fn room_channel(room: &RoomId) -> String {
    format!("channel:room:{room}")
}

/// The rematch-vote field of one voter inside a room hash.
pub fn vote_field(player: &PlayerId) -> String {
    format!("vote:{player}")
}

/// The inverse of [`vote_field`]: the voter id, if this is a vote field.
pub fn vote_field_player(field: &str) -> Option<PlayerId> {
    field.strip_prefix("vote:").map(PlayerId::from)
}
