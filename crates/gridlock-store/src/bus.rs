//! The coordination pub/sub seam.

use async_trait::async_trait;
use gridlock_protocol::{Event, RoomId};
use tokio::sync::mpsc;

use crate::StoreError;

/// Best-effort pub/sub between instances.
///
/// Delivery is at-most-once to current subscribers, and that is enough:
/// every state-changing operation has already committed to the store
/// before its event is published, so an event is a notification, never
/// the source of truth. Consumers tolerate loss by re-reading the store.
#[async_trait]
pub trait EventBus: Send + Sync + 'static {
    /// Publishes a coordination envelope on the well-known channel.
    async fn publish(&self, event: &Event) -> Result<(), StoreError>;

    /// Publishes a content-free wake on the room's channel, telling
    /// every surrogate to re-read the record and rebroadcast.
    async fn publish_room_wake(&self, room: &RoomId) -> Result<(), StoreError>;

    /// Subscribes to the coordination channel. Messages that do not
    /// decode as [`Event`] are logged and skipped by the pump.
    async fn subscribe(&self) -> Result<mpsc::Receiver<Event>, StoreError>;

    /// Subscribes to one room's wake channel.
    async fn subscribe_room(
        &self,
        room: &RoomId,
    ) -> Result<mpsc::Receiver<()>, StoreError>;
}
