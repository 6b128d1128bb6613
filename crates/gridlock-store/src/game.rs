//! The authoritative game record and its store seam.

use std::collections::HashSet;

use async_trait::async_trait;
use gridlock_protocol::{PlayerId, RoomId};
use gridlock_rules::{Board, GameStatus, Mark, Winner};

use crate::StoreError;

/// A full snapshot of one room record.
///
/// This is what `find` returns and what every broadcastable `update`
/// frame is built from. It never travels between instances directly —
/// each instance reads its own snapshot after a wake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub board: Board,
    pub next_turn: Mark,
    pub winner: Winner,
    pub status: GameStatus,
    pub player_x: PlayerId,
    pub player_o: PlayerId,
}

impl GameState {
    /// Maps a seated player to their mark; `None` for strangers.
    pub fn mark_of(&self, player: &PlayerId) -> Option<Mark> {
        if *player == self.player_x {
            Some(Mark::X)
        } else if *player == self.player_o {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// The player seated as `mark`.
    pub fn player_for(&self, mark: Mark) -> &PlayerId {
        match mark {
            Mark::X => &self.player_x,
            Mark::O => &self.player_o,
        }
    }

    /// Returns `true` once the record is immutable until a rematch reset.
    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }
}

/// Authoritative, atomic room state.
///
/// Only this seam writes game state; every writer goes through
/// [`update`](GameStore::update)'s optimistic transaction.
#[async_trait]
pub trait GameStore: Send + Sync + 'static {
    /// Initializes (or re-initializes) the record: empty board, randomly
    /// chosen first mover, `in_progress`, no winner.
    ///
    /// Idempotent by overwrite. Rematch reset calls this with the X and
    /// O arguments swapped so the previous O opens the new game.
    async fn create(
        &self,
        room: &RoomId,
        player_x: &PlayerId,
        player_o: &PlayerId,
    ) -> Result<(), StoreError>;

    /// Reads the full record.
    async fn find(&self, room: &RoomId) -> Result<GameState, StoreError>;

    /// Applies one move atomically: validate against the current record,
    /// then write the new board, the flipped turn, the recomputed winner,
    /// and `finished` when the game is decided.
    ///
    /// Coordinates arrive signed; bounds are part of validation. A lost
    /// optimistic race is retried a bounded number of times and then
    /// reported as [`StoreError::Conflict`].
    async fn update(
        &self,
        room: &RoomId,
        mark: Mark,
        row: i64,
        col: i64,
    ) -> Result<GameState, StoreError>;

    /// Sets the voter's rematch marker. Idempotent.
    async fn record_vote(
        &self,
        room: &RoomId,
        voter: &PlayerId,
    ) -> Result<(), StoreError>;

    /// Reads the set of players who have voted for a rematch.
    async fn get_votes(&self, room: &RoomId) -> Result<HashSet<PlayerId>, StoreError>;

    /// Removes both seats' vote markers.
    async fn clear_votes(
        &self,
        room: &RoomId,
        player_x: &PlayerId,
        player_o: &PlayerId,
    ) -> Result<(), StoreError>;
}
