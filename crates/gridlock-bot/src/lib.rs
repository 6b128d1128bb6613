//! Bot opponents for Gridlock.
//!
//! Two pieces: [`HeuristicStrategy`], the default
//! [`OpponentStrategy`](gridlock_room::OpponentStrategy) implementation
//! behind both bot games and turn-timeout proxy moves, and
//! [`BotAgent`], the pseudo-connection that lets a bot occupy a seat
//! through the exact same [`Connection`](gridlock_room::Connection)
//! surface a human socket uses.

mod agent;
mod heuristics;

pub use agent::BotAgent;
pub use heuristics::HeuristicStrategy;
