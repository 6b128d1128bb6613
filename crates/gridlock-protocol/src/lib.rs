//! Wire protocol for Gridlock.
//!
//! This crate defines every structure that leaves a process:
//!
//! - **Identity** ([`PlayerId`], [`RoomId`], [`InstanceId`]) — the
//!   opaque string ids shared by sockets, the store, and the bus.
//! - **Frames** ([`ClientMessage`], [`ServerMessage`]) — the JSON
//!   messages exchanged with clients over the WebSocket.
//! - **Events** ([`Event`]) — the envelopes published on the shared bus
//!   to coordinate instances.
//!
//! The JSON shapes are load-bearing: browser clients and every other
//! instance in the cluster parse them, so the serde attributes here are
//! pinned by tests rather than left to convention.

mod event;
mod ids;
mod message;

pub use event::Event;
pub use ids::{InstanceId, PlayerId, RoomId};
pub use message::{ClientMessage, ServerMessage};
