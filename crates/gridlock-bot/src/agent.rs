//! The bot pseudo-connection.
//!
//! A [`BotAgent`] occupies a seat through the same [`Connection`] trait
//! a WebSocket uses, so the room broadcasts to it like any player. It
//! watches the frames it is "sent": an `assignment` tells it which mark
//! it holds, and an `update` whose turn is the bot's (with no winner)
//! schedules a move — a short simulated think, then a normal move frame
//! injected into the owning room's inbox.
//!
//! `recv` reports end-of-stream immediately, so no reader task is ever
//! spawned for a bot and the disconnect path never runs for one.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gridlock_protocol::{ClientMessage, PlayerId, ServerMessage};
use gridlock_room::{
    Connection, ConnectionError, Difficulty, Inbound, OpponentStrategy,
};
use gridlock_rules::{Mark, Winner};
use tokio::sync::mpsc;

/// Simulated deliberation before the bot answers an update.
const THINK_TIME: Duration = Duration::from_secs(1);

/// A bot player's connection endpoint.
pub struct BotAgent {
    player_id: PlayerId,
    difficulty: Difficulty,
    strategy: Arc<dyn OpponentStrategy>,
    inbox: mpsc::Sender<Inbound>,
    mark: Mutex<Option<Mark>>,
}

impl BotAgent {
    /// Wires a bot to its room's inbox. The mark arrives later, in the
    /// first `assignment` frame the room sends.
    pub fn new(
        player_id: PlayerId,
        difficulty: Difficulty,
        strategy: Arc<dyn OpponentStrategy>,
        inbox: mpsc::Sender<Inbound>,
    ) -> Arc<BotAgent> {
        Arc::new(BotAgent {
            player_id,
            difficulty,
            strategy,
            inbox,
            mark: Mutex::new(None),
        })
    }

    fn on_assignment(&self, mark: Mark) {
        *self.mark.lock().expect("mark lock") = Some(mark);
        tracing::info!(bot_id = %self.player_id, %mark, "bot assigned mark");
    }

    fn on_update(&self, board: gridlock_rules::Board, next: Mark, winner: Winner) {
        let Some(mark) = *self.mark.lock().expect("mark lock") else {
            // Update before assignment — a rematch reset will re-send both.
            return;
        };
        if next != mark || winner.is_decided() {
            return;
        }

        let bot_id = self.player_id.clone();
        let difficulty = self.difficulty;
        let strategy = self.strategy.clone();
        let inbox = self.inbox.clone();

        tracing::debug!(bot_id = %bot_id, "bot is thinking");
        tokio::spawn(async move {
            tokio::time::sleep(THINK_TIME).await;

            let Some((row, col)) = strategy.next_move(&board, mark, difficulty) else {
                tracing::warn!(bot_id = %bot_id, "bot found no legal move");
                return;
            };

            tracing::info!(bot_id = %bot_id, row, col, "bot plays");
            let frame = match serde_json::to_vec(&ClientMessage::new_move(
                row as i64, col as i64,
            )) {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::error!(bot_id = %bot_id, error = %err, "unserializable bot move");
                    return;
                }
            };
            if inbox.send((bot_id.clone(), frame)).await.is_err() {
                tracing::debug!(bot_id = %bot_id, "room inbox closed, discarding bot move");
            }
        });
    }
}

#[async_trait]
impl Connection for BotAgent {
    /// "Writing" to a bot means letting it read the frame.
    async fn send(&self, data: &[u8]) -> Result<(), ConnectionError> {
        // Frames that fail to decode are for humans (or malformed);
        // the bot just ignores them.
        let Ok(message) = serde_json::from_slice::<ServerMessage>(data) else {
            return Ok(());
        };

        match message {
            ServerMessage::Assignment { mark } => self.on_assignment(mark),
            ServerMessage::Update {
                board,
                next,
                winner,
            } => self.on_update(board, next, winner),
            _ => {}
        }
        Ok(())
    }

    /// Bots have nothing to read; end-of-stream keeps any reader from
    /// parking on them.
    async fn recv(&self) -> Result<Option<Vec<u8>>, ConnectionError> {
        Ok(None)
    }
}
