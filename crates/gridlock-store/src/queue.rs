//! The cross-instance FIFO matchmaking queue seam.

use async_trait::async_trait;
use gridlock_protocol::PlayerId;

use crate::StoreError;

/// A single shared FIFO of waiting player ids.
///
/// Matcher loops on several instances may race on the same queue; each
/// popped entry is consumed by exactly one of them. Uniqueness is not
/// enforced here — registration removes stale entries before pushing.
#[async_trait]
pub trait MatchQueue: Send + Sync + 'static {
    /// Appends a player to the tail.
    async fn push(&self, player: &PlayerId) -> Result<(), StoreError>;

    /// Blocks until two players have been popped from the head.
    ///
    /// Pops one at a time because the primitive must stay strictly FIFO
    /// and work across instances with blocking semantics. If the second
    /// pop fails, the first id is re-pushed before the error propagates
    /// so no waiting player is lost.
    async fn pop_pair(&self) -> Result<(PlayerId, PlayerId), StoreError>;

    /// Removes every occurrence of the player (unregister, re-register).
    async fn remove(&self, player: &PlayerId) -> Result<(), StoreError>;
}
