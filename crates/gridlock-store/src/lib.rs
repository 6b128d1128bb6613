//! Shared-state layer for Gridlock.
//!
//! Everything the cluster agrees on lives behind four seams:
//!
//! - [`GameStore`] — the authoritative room record, mutated only through
//!   an optimistic transaction.
//! - [`PlayerStore`] — per-player session metadata (home instance, room,
//!   connection status).
//! - [`MatchQueue`] — the cross-instance FIFO matchmaking queue.
//! - [`EventBus`] — best-effort pub/sub used for coordination only; the
//!   store is always the source of truth.
//!
//! Two backends implement all four: [`redis`](crate::redis_impl) for
//! production clusters and [`memory`] for tests and single-node
//! development. The traits are object-safe so the hub can hold them as
//! a [`Stores`] bundle of `Arc<dyn ...>` handles.

mod bus;
mod error;
mod game;
pub mod keys;
pub mod memory;
mod player;
mod queue;
mod redis_impl;

use std::sync::Arc;

pub use bus::EventBus;
pub use error::StoreError;
pub use game::{GameState, GameStore};
pub use player::{ConnectionStatus, PlayerStore, ReconnectInfo, SessionStatus};
pub use queue::MatchQueue;
pub use redis_impl::{
    RedisEventBus, RedisGameStore, RedisMatchQueue, RedisPlayerStore,
};

/// One handle bundle for every shared-state seam.
///
/// Cheap to clone; each field is an `Arc<dyn Trait>` so the same bundle
/// wires the hub, the matcher, every room surrogate, and the tests.
#[derive(Clone)]
pub struct Stores {
    pub games: Arc<dyn GameStore>,
    pub players: Arc<dyn PlayerStore>,
    pub queue: Arc<dyn MatchQueue>,
    pub bus: Arc<dyn EventBus>,
}

impl Stores {
    /// Builds the Redis-backed bundle from one shared client.
    pub fn redis(client: ::redis::Client) -> Stores {
        Stores {
            games: Arc::new(RedisGameStore::new(client.clone())),
            players: Arc::new(RedisPlayerStore::new(client.clone())),
            queue: Arc::new(RedisMatchQueue::new(client.clone())),
            bus: Arc::new(RedisEventBus::new(client)),
        }
    }

    /// Builds the in-memory bundle (tests, single-node development).
    pub fn in_memory() -> Stores {
        Stores {
            games: Arc::new(memory::MemoryGameStore::new()),
            players: Arc::new(memory::MemoryPlayerStore::new()),
            queue: Arc::new(memory::MemoryMatchQueue::new()),
            bus: Arc::new(memory::MemoryEventBus::new()),
        }
    }
}
