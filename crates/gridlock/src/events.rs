//! The per-room wake subscriber.
//!
//! Each local surrogate gets one task subscribed to its
//! `channel:room:<id>`. The wake carries nothing; on every message the
//! task re-reads the authoritative record and broadcasts a fresh
//! `update` to the local sockets. State never rides the bus.

use std::sync::Arc;

use gridlock_room::{update_frame, Room};
use gridlock_store::{EventBus, GameStore};

/// Spawns the wake subscriber for one surrogate. The task exits when
/// the room stops or the bus closes the channel.
pub(crate) fn spawn_room_subscriber(
    room: Arc<Room>,
    games: Arc<dyn GameStore>,
    bus: Arc<dyn EventBus>,
) {
    tokio::spawn(async move {
        let mut wakes = match bus.subscribe_room(room.id()).await {
            Ok(wakes) => wakes,
            Err(err) => {
                tracing::warn!(
                    room_id = %room.id(),
                    error = %err,
                    "cannot subscribe to room channel"
                );
                return;
            }
        };
        let mut stop = room.stop_signal();
        if *stop.borrow() {
            return;
        }
        tracing::debug!(room_id = %room.id(), "room subscriber started");

        loop {
            tokio::select! {
                _ = stop.changed() => break,

                wake = wakes.recv() => match wake {
                    Some(()) => match games.find(room.id()).await {
                        Ok(state) => room.broadcast(&update_frame(&state)).await,
                        Err(err) => {
                            tracing::warn!(
                                room_id = %room.id(),
                                error = %err,
                                "wake received but state read failed"
                            );
                        }
                    },
                    None => break,
                },
            }
        }

        tracing::debug!(room_id = %room.id(), "room subscriber stopped");
    });
}
