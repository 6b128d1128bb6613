//! The 3×3 board and winner detection.

use serde::{Deserialize, Serialize};

use crate::{Cell, Mark, Winner};

/// Board side length. Valid coordinates are `0..SIZE` on both axes.
pub const SIZE: usize = 3;

/// A 3×3 grid of cells.
///
/// Serializes transparently as a nested array — `[["X","",""],...]` —
/// which is the exact shape carried in `update` frames and stored in the
/// room record's `board` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([[Cell; SIZE]; SIZE]);

impl Board {
    /// An empty board.
    pub fn new() -> Board {
        Board::default()
    }

    /// Returns the cell at `(row, col)`. Callers pass validated indices.
    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.0[row][col]
    }

    /// Places `mark` at `(row, col)`, overwriting whatever is there.
    /// Legality is the validator's job, not the board's.
    pub fn place(&mut self, row: usize, col: usize, mark: Mark) {
        self.0[row][col] = mark.into();
    }

    /// Returns `true` if every cell holds a mark.
    pub fn is_full(&self) -> bool {
        self.0
            .iter()
            .all(|row| row.iter().all(|cell| !cell.is_empty()))
    }

    /// Iterates over the coordinates of every empty cell.
    pub fn empty_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..SIZE).flat_map(move |r| {
            (0..SIZE).filter_map(move |c| self.0[r][c].is_empty().then_some((r, c)))
        })
    }

    /// Scans rows, columns, and both diagonals for three in a row.
    ///
    /// Returns the winning mark, [`Winner::Draw`] when the board is full
    /// with no line, and [`Winner::None`] otherwise.
    pub fn winner(&self) -> Winner {
        let lines: [[(usize, usize); 3]; 8] = [
            [(0, 0), (0, 1), (0, 2)],
            [(1, 0), (1, 1), (1, 2)],
            [(2, 0), (2, 1), (2, 2)],
            [(0, 0), (1, 0), (2, 0)],
            [(0, 1), (1, 1), (2, 1)],
            [(0, 2), (1, 2), (2, 2)],
            [(0, 0), (1, 1), (2, 2)],
            [(0, 2), (1, 1), (2, 0)],
        ];

        for line in lines {
            let [a, b, c] = line.map(|(r, c)| self.0[r][c]);
            if !a.is_empty() && a == b && b == c {
                // A full line of one mark; `mark()` cannot be None here.
                return a.mark().map(Winner::from).unwrap_or(Winner::None);
            }
        }

        if self.is_full() {
            Winner::Draw
        } else {
            Winner::None
        }
    }
}
