//! The room layer: one actor per locally-represented game.
//!
//! A [`Room`] is a *surrogate* — a per-instance, in-memory stand-in for
//! one authoritative room record. It holds the locally connected
//! players, arbitrates their messages through a single command loop,
//! arms the move/heartbeat/grace timers, and broadcasts state to local
//! sockets. The shared store holds truth; the surrogate only ever
//! re-reads it.
//!
//! The crate also owns the [`Connection`] abstraction (human sockets and
//! bot pseudo-connections share it — nothing outside bot setup may ask
//! which is which), the per-socket reader task, and the
//! [`OpponentStrategy`] seam used both for bot opponents and for
//! turn-timeout proxy moves.

mod connection;
mod player;
mod room;
mod strategy;

pub use connection::{spawn_reader, Connection, ConnectionError, WsConnection};
pub use player::Player;
pub use room::{update_frame, Inbound, Room, HEARTBEAT_INTERVAL, RECONNECT_GRACE};
pub use strategy::{Difficulty, OpponentStrategy};
