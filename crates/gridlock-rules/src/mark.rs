//! Player marks, board cells, and game outcomes.
//!
//! All three types serialize as the bare strings the wire protocol and
//! the store use: `"X"`, `"O"`, `""` for an empty cell or no winner,
//! `"Draw"` for a drawn game.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// The token of a player: X or O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    /// Returns the other player's mark.
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    /// Randomly chooses which mark opens the game.
    pub fn random_first() -> Mark {
        if rand::rng().random::<bool>() {
            Mark::X
        } else {
            Mark::O
        }
    }

    /// The string form used in store hashes (`"X"` / `"O"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }

    /// Parses the store string form. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Mark> {
        match s {
            "X" => Some(Mark::X),
            "O" => Some(Mark::O),
            _ => None,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One square of the board.
///
/// The empty cell serializes as `""` so a board row looks like
/// `["X", "", "O"]` on the wire and in the store, matching what the
/// browser client renders directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    #[serde(rename = "")]
    Empty,
    X,
    O,
}

impl Cell {
    /// Returns `true` if no mark has been placed here.
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }

    /// The mark occupying this cell, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Mark::X),
            Cell::O => Some(Mark::O),
        }
    }
}

impl From<Mark> for Cell {
    fn from(mark: Mark) -> Cell {
        match mark {
            Mark::X => Cell::X,
            Mark::O => Cell::O,
        }
    }
}

/// The outcome of a game as recorded in the room record.
///
/// `None` (serialized `""`) while the game is undecided; `Draw` when the
/// board filled without a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    #[default]
    #[serde(rename = "")]
    None,
    X,
    O,
    Draw,
}

impl Winner {
    /// Returns `true` once the game has a decision (win or draw).
    pub fn is_decided(self) -> bool {
        self != Winner::None
    }

    /// The string form used in store hashes.
    pub fn as_str(self) -> &'static str {
        match self {
            Winner::None => "",
            Winner::X => "X",
            Winner::O => "O",
            Winner::Draw => "Draw",
        }
    }

    /// Parses the store string form. Unknown strings are `None`.
    pub fn parse(s: &str) -> Winner {
        match s {
            "X" => Winner::X,
            "O" => Winner::O,
            "Draw" => Winner::Draw,
            _ => Winner::None,
        }
    }
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Winner {
        match mark {
            Mark::X => Winner::X,
            Mark::O => Winner::O,
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
