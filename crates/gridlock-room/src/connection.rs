//! The connection abstraction and the per-socket reader task.
//!
//! Human sockets and bot pseudo-connections share one capability set:
//! write a frame, read a frame, ping, close. The rest of the system
//! never branches on which it is talking to — a bot's reader simply
//! reports end-of-stream, so the reader task is never spawned for it
//! and the teardown path never runs.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use gridlock_protocol::{Event, RoomId};
use gridlock_store::{ConnectionStatus, EventBus, PlayerStore};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::{Inbound, Player};

/// Errors surfaced by a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The underlying WebSocket failed mid-operation.
    #[error("websocket failure: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection is already closed.
    #[error("connection closed")]
    Closed,
}

/// One bidirectional client link.
///
/// `recv` returning `Ok(None)` means a clean end of stream. Writes from
/// concurrent tasks are serialized inside the implementation, so a
/// frame never interleaves with another mid-write.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Writes one frame.
    async fn send(&self, data: &[u8]) -> Result<(), ConnectionError>;

    /// Reads the next frame; `None` when the peer is gone for good.
    async fn recv(&self) -> Result<Option<Vec<u8>>, ConnectionError>;

    /// Liveness probe. Default: no-op (bots are always alive).
    async fn ping(&self) -> Result<(), ConnectionError> {
        Ok(())
    }

    /// Closes the link. Default: no-op.
    async fn close(&self) -> Result<(), ConnectionError> {
        Ok(())
    }
}

type WsStream = WebSocketStream<TcpStream>;

/// A server-side WebSocket connection.
///
/// The sink and stream halves are split and locked independently: the
/// reader task parks inside `recv` for the socket's whole lifetime, and
/// a shared lock would starve every broadcast.
pub struct WsConnection {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WsConnection {
    pub fn new(ws: WsStream) -> Arc<WsConnection> {
        let (sink, stream) = ws.split();
        Arc::new(WsConnection {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&self, data: &[u8]) -> Result<(), ConnectionError> {
        // Frames are JSON; browsers get text frames like the rest of
        // the protocol tooling expects.
        let text = String::from_utf8_lossy(data).into_owned();
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(ConnectionError::from)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, ConnectionError> {
        loop {
            let msg = self.stream.lock().await.next().await;
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()))
                }
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frames
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }

    async fn ping(&self) -> Result<(), ConnectionError> {
        self.sink
            .lock()
            .await
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(ConnectionError::from)
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        // Best effort: the peer may already be gone.
        let _ = self.sink.lock().await.send(Message::Close(None)).await;
        Ok(())
    }
}

/// Spawns the reader task for one human socket.
///
/// Pumps frames into the room's inbox until the socket ends, then runs
/// the disconnect path: close, mark the player disconnected locally and
/// in the store, and publish `player_disconnected` so the opponent's
/// instance can react. Reconnection within the grace window reverses
/// all of it.
pub fn spawn_reader(
    player: Arc<Player>,
    room_id: RoomId,
    inbox: mpsc::Sender<Inbound>,
    players: Arc<dyn PlayerStore>,
    bus: Arc<dyn EventBus>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match player.conn().recv().await {
                Ok(Some(frame)) => {
                    if inbox.send((player.id().clone(), frame)).await.is_err() {
                        // Room loop is gone; nothing left to read for.
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!(player_id = %player.id(), room_id = %room_id, "connection closed");
                    break;
                }
                Err(err) => {
                    tracing::info!(
                        player_id = %player.id(),
                        room_id = %room_id,
                        error = %err,
                        "connection error, treating as disconnect"
                    );
                    break;
                }
            }
        }

        let _ = player.conn().close().await;
        player.mark_disconnected();

        if let Err(err) = players
            .set_connection(player.id(), ConnectionStatus::Disconnected)
            .await
        {
            tracing::warn!(player_id = %player.id(), error = %err, "failed to record disconnect");
        }

        let event = Event::PlayerDisconnected {
            room_id: room_id.clone(),
            player_id: player.id().clone(),
        };
        if let Err(err) = bus.publish(&event).await {
            tracing::warn!(player_id = %player.id(), error = %err, "failed to publish disconnect event");
        }

        tracing::debug!(player_id = %player.id(), room_id = %room_id, "reader task finished");
    })
}
