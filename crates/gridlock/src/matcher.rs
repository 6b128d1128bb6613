//! The cross-instance matcher.
//!
//! Every instance runs one; they race safely because each queue pop is
//! consumed by exactly one matcher. A matched pair gets a fresh room
//! record and a `match_made` event; the instances that home the two
//! players pick the event up and build their surrogates.

use std::time::Duration;

use gridlock_protocol::{Event, RoomId};
use gridlock_store::{EventBus, GameStore, MatchQueue, PlayerStore, Stores};

/// Back-off after any store failure, so a sick store is not hammered.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Spawns the matcher loop. Runs for the life of the process.
pub fn spawn_matcher(stores: Stores) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("matcher started");

        loop {
            let (first, second) = match stores.queue.pop_pair().await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(error = %err, "queue pop failed, backing off");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    continue;
                }
            };

            let room_id = RoomId::random();

            if let Err(err) = stores.games.create(&room_id, &first, &second).await {
                // Compensate: neither player may be lost to the queue.
                tracing::warn!(
                    room_id = %room_id,
                    error = %err,
                    "game create failed, re-queuing both players"
                );
                for player in [&first, &second] {
                    if let Err(requeue) = stores.queue.push(player).await {
                        tracing::error!(
                            player_id = %player,
                            error = %requeue,
                            "failed to re-queue player"
                        );
                    }
                }
                tokio::time::sleep(RETRY_BACKOFF).await;
                continue;
            }

            for player in [&first, &second] {
                if let Err(err) = stores.players.set_for_match(player, &room_id).await {
                    tracing::warn!(
                        player_id = %player,
                        error = %err,
                        "failed to seat player for match"
                    );
                }
            }

            let event = Event::MatchMade {
                room_id: room_id.clone(),
                player_ids: vec![first.clone(), second.clone()],
            };
            if let Err(err) = stores.bus.publish(&event).await {
                tracing::warn!(room_id = %room_id, error = %err, "failed to publish match");
                continue;
            }

            tracing::info!(
                room_id = %room_id,
                player1_id = %first,
                player2_id = %second,
                "match made"
            );
        }
    })
}
