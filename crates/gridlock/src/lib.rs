//! # Gridlock
//!
//! A horizontally scalable session server for two-player grid games.
//! Any number of stateless instances accept WebSocket connections; a
//! shared Redis store holds the authoritative game and player state,
//! and its pub/sub bus coordinates instances so two matched players can
//! land on different processes and still play together.
//!
//! This meta crate ties the layers together: the per-instance [`Hub`]
//! (player registry, registration/reconnection, event fan-out), the
//! cross-instance matcher, and the WebSocket server exposing the
//! session endpoint
//! `GET /api/ws?mode={human|bot}&difficulty={easy|medium|hard}&playerId={id?}`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use gridlock::prelude::*;
//!
//! # async fn run() -> Result<(), GridlockError> {
//! let client = redis::Client::open("redis://127.0.0.1:6379")
//!     .map_err(gridlock_store::StoreError::from)?;
//! let server = GridlockServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(Stores::redis(client))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod events;
mod hub;
mod matcher;
mod server;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::GridlockError;
pub use hub::{GameMode, Hub, HubHandle, RegistrationRequest};
pub use matcher::spawn_matcher;
pub use server::{GridlockServer, GridlockServerBuilder};

/// Re-exports everything an embedding or test needs.
pub mod prelude {
    pub use crate::{
        GameMode, GridlockError, GridlockServer, GridlockServerBuilder, Hub,
        HubHandle, ServerConfig,
    };

    pub use gridlock_bot::{BotAgent, HeuristicStrategy};
    pub use gridlock_protocol::{
        ClientMessage, Event, InstanceId, PlayerId, RoomId, ServerMessage,
    };
    pub use gridlock_room::{
        Connection, Difficulty, OpponentStrategy, Player, Room,
    };
    pub use gridlock_rules::{Board, Cell, GameStatus, Mark, Winner};
    pub use gridlock_store::{
        EventBus, GameState, GameStore, MatchQueue, PlayerStore, Stores,
    };
}
