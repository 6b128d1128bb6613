//! Pure board logic for Gridlock.
//!
//! Everything in this crate is synchronous and side-effect free: the
//! board vocabulary ([`Mark`], [`Cell`], [`Board`], [`Winner`]) and the
//! move validator. The store layer calls into it inside its optimistic
//! transaction; the bot heuristics scan [`Board`] directly.
//!
//! No I/O, no concurrency — fully testable in isolation.

mod board;
mod mark;
mod validate;

pub use board::{Board, SIZE};
pub use mark::{Cell, Mark, Winner};
pub use validate::{validate_move, GameStatus, MoveError};
