//! Error type for the shared-state layer.

use gridlock_protocol::RoomId;
use gridlock_rules::MoveError;

/// Errors from any of the four store seams.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists for the room.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The move failed validation against the current record. Callers
    /// drop these silently — the client simply sees no state change.
    #[error(transparent)]
    InvalidMove(#[from] MoveError),

    /// The optimistic transaction kept losing the race. The fresh state
    /// has made the attempt illegal anyway, so callers treat this like
    /// an invalid move.
    #[error("concurrent update conflict on room record")]
    Conflict,

    /// The backing store refused or dropped the operation.
    #[error("store unavailable: {0}")]
    Backend(#[from] redis::RedisError),

    /// A record exists but one of its fields does not parse. Only a
    /// foreign writer or a schema change can produce this.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns `true` for the rejections a room handles by silently
    /// dropping the move (validation failures and lost races), as
    /// opposed to backend trouble worth logging loudly.
    pub fn is_rejected_move(&self) -> bool {
        matches!(self, StoreError::InvalidMove(_) | StoreError::Conflict)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> StoreError {
        StoreError::Corrupt(err.to_string())
    }
}
