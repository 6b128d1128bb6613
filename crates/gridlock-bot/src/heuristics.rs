//! The tiered move heuristic.
//!
//! - **easy**: a uniformly random empty cell.
//! - **medium**: win if a winning cell exists, otherwise block the
//!   opponent's winning cell, otherwise random.
//! - **hard**: win, block, then positional preference — center first,
//!   then a random free corner, then a random free side.
//!
//! Every tier returns `None` iff the board has no empty cell, which is
//! the strategy contract the room relies on.

use gridlock_room::{Difficulty, OpponentStrategy};
use gridlock_rules::{Board, Mark, Winner};
use rand::seq::IndexedRandom;

/// The default strategy plugged into rooms and bot agents.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStrategy;

impl OpponentStrategy for HeuristicStrategy {
    fn next_move(
        &self,
        board: &Board,
        mark: Mark,
        difficulty: Difficulty,
    ) -> Option<(usize, usize)> {
        match difficulty {
            Difficulty::Easy => random_move(board),
            Difficulty::Medium => medium_move(board, mark),
            Difficulty::Hard => hard_move(board, mark),
        }
    }
}

fn random_move(board: &Board) -> Option<(usize, usize)> {
    let open: Vec<(usize, usize)> = board.empty_cells().collect();
    open.choose(&mut rand::rng()).copied()
}

fn medium_move(board: &Board, mark: Mark) -> Option<(usize, usize)> {
    winning_move(board, mark)
        .or_else(|| winning_move(board, mark.opponent()))
        .or_else(|| random_move(board))
}

fn hard_move(board: &Board, mark: Mark) -> Option<(usize, usize)> {
    if let Some(cell) = winning_move(board, mark) {
        return Some(cell);
    }
    if let Some(cell) = winning_move(board, mark.opponent()) {
        return Some(cell);
    }
    if board.get(1, 1).is_empty() {
        return Some((1, 1));
    }

    const CORNERS: [(usize, usize); 4] = [(0, 0), (0, 2), (2, 0), (2, 2)];
    let open_corners: Vec<(usize, usize)> = CORNERS
        .iter()
        .copied()
        .filter(|&(r, c)| board.get(r, c).is_empty())
        .collect();
    if let Some(&corner) = open_corners.choose(&mut rand::rng()) {
        return Some(corner);
    }

    const SIDES: [(usize, usize); 4] = [(0, 1), (1, 0), (1, 2), (2, 1)];
    let open_sides: Vec<(usize, usize)> = SIDES
        .iter()
        .copied()
        .filter(|&(r, c)| board.get(r, c).is_empty())
        .collect();
    open_sides.choose(&mut rand::rng()).copied()
}

/// The cell that completes three-in-a-row for `mark`, if one exists.
/// Tries each empty cell and asks the rules whether it wins.
fn winning_move(board: &Board, mark: Mark) -> Option<(usize, usize)> {
    board.empty_cells().find(|&(r, c)| {
        let mut trial = *board;
        trial.place(r, c, mark);
        trial.winner() == Winner::from(mark)
    })
}
