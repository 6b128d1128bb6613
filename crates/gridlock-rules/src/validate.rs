//! Move validation.
//!
//! The single legality check every move goes through, whether it came
//! from a socket, a bot, or the turn-timeout proxy. The store layer runs
//! it inside the optimistic transaction so the decision is always made
//! against the state being written.

use serde::{Deserialize, Serialize};

use crate::{Board, Mark, SIZE};

/// Lifecycle of a room record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    InProgress,
    Finished,
}

impl GameStatus {
    /// The string form used in store hashes.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::InProgress => "in_progress",
            GameStatus::Finished => "finished",
        }
    }

    /// Parses the store string form; anything unrecognized reads as
    /// `in_progress` (the record is then still mutable, and the move
    /// validator re-decides on the actual board).
    pub fn parse(s: &str) -> GameStatus {
        match s {
            "finished" => GameStatus::Finished,
            _ => GameStatus::InProgress,
        }
    }
}

/// Why a move was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// Coordinates outside `[0, 2]` on either axis.
    #[error("position out of bounds")]
    OutOfBounds,

    /// The target cell already holds a mark.
    #[error("cell already occupied")]
    CellOccupied,

    /// The caller's mark does not own the current turn.
    #[error("not your turn")]
    NotYourTurn,

    /// The game already has a winner or a full board.
    #[error("game already finished")]
    GameOver,
}

/// Checks a move against the full rule set and returns the coordinates
/// as usable indices.
///
/// Order matters for the reported error: a finished game rejects
/// everything, then turn ownership, then bounds, then occupancy.
/// Coordinates come in signed so off-by-one client bugs like `(-1, 0)`
/// are rejected here rather than panicking on an index.
pub fn validate_move(
    board: &Board,
    row: i64,
    col: i64,
    mark: Mark,
    next_turn: Mark,
    status: GameStatus,
) -> Result<(usize, usize), MoveError> {
    if status == GameStatus::Finished {
        return Err(MoveError::GameOver);
    }
    if mark != next_turn {
        return Err(MoveError::NotYourTurn);
    }
    if !(0..SIZE as i64).contains(&row) || !(0..SIZE as i64).contains(&col) {
        return Err(MoveError::OutOfBounds);
    }
    let (row, col) = (row as usize, col as usize);
    if !board.get(row, col).is_empty() {
        return Err(MoveError::CellOccupied);
    }
    Ok((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_progress(
        board: &Board,
        row: i64,
        col: i64,
        mark: Mark,
        next: Mark,
    ) -> Result<(usize, usize), MoveError> {
        validate_move(board, row, col, mark, next, GameStatus::InProgress)
    }

    #[test]
    fn test_validate_move_accepts_legal_move() {
        let board = Board::new();
        let placed = in_progress(&board, 1, 2, Mark::X, Mark::X);
        assert_eq!(placed, Ok((1, 2)));
    }

    #[test]
    fn test_validate_move_rejects_negative_coordinates() {
        let board = Board::new();
        assert_eq!(
            in_progress(&board, -1, 0, Mark::X, Mark::X),
            Err(MoveError::OutOfBounds)
        );
        assert_eq!(
            in_progress(&board, 0, -3, Mark::X, Mark::X),
            Err(MoveError::OutOfBounds)
        );
    }

    #[test]
    fn test_validate_move_rejects_overflow_coordinates() {
        let board = Board::new();
        assert_eq!(
            in_progress(&board, 0, 3, Mark::X, Mark::X),
            Err(MoveError::OutOfBounds)
        );
        assert_eq!(
            in_progress(&board, 3, 3, Mark::X, Mark::X),
            Err(MoveError::OutOfBounds)
        );
    }

    #[test]
    fn test_validate_move_rejects_occupied_cell() {
        let mut board = Board::new();
        board.place(0, 0, Mark::O);
        assert_eq!(
            in_progress(&board, 0, 0, Mark::X, Mark::X),
            Err(MoveError::CellOccupied)
        );
    }

    #[test]
    fn test_validate_move_rejects_out_of_turn_caller() {
        let board = Board::new();
        assert_eq!(
            in_progress(&board, 0, 0, Mark::O, Mark::X),
            Err(MoveError::NotYourTurn)
        );
    }

    #[test]
    fn test_validate_move_rejects_finished_game() {
        let board = Board::new();
        let rejected =
            validate_move(&board, 0, 0, Mark::X, Mark::X, GameStatus::Finished);
        assert_eq!(rejected, Err(MoveError::GameOver));
    }

    #[test]
    fn test_validate_move_game_over_wins_over_turn_error() {
        // A finished game reports GameOver even when the caller is also
        // out of turn — the client should see one stable reason.
        let board = Board::new();
        let rejected =
            validate_move(&board, 0, 0, Mark::O, Mark::X, GameStatus::Finished);
        assert_eq!(rejected, Err(MoveError::GameOver));
    }

    #[test]
    fn test_game_status_parse_round_trips() {
        assert_eq!(GameStatus::parse("in_progress"), GameStatus::InProgress);
        assert_eq!(GameStatus::parse("finished"), GameStatus::Finished);
        assert_eq!(GameStatus::parse(""), GameStatus::InProgress);
    }
}
