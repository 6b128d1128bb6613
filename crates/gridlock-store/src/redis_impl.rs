//! Redis implementations of the four store seams.
//!
//! One `redis::Client` is shared by value (it is a cheap handle); each
//! operation takes a multiplexed connection, except the two cases that
//! need a dedicated one: the WATCH transaction in
//! [`RedisGameStore::update`] (WATCH state is per-connection) and the
//! blocking BLPOP in [`RedisMatchQueue::pop_pair`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures_util::StreamExt;
use gridlock_protocol::{Event, InstanceId, PlayerId, RoomId};
use gridlock_rules::{validate_move, Board, GameStatus, Mark, Winner};
use redis::AsyncCommands;
use tokio::sync::mpsc;

use crate::keys::{
    player_key, room_channel, room_key, vote_field, vote_field_player,
    EVENTS_CHANNEL, FIELD_BOARD, FIELD_CONNECTION_STATUS, FIELD_HOME_INSTANCE,
    FIELD_NEXT_TURN, FIELD_PLAYER_O, FIELD_PLAYER_X, FIELD_ROOM_ID,
    FIELD_SESSION_STATUS, FIELD_STATUS, FIELD_WINNER, MATCHMAKING_QUEUE,
};
use crate::{
    ConnectionStatus, EventBus, GameState, GameStore, MatchQueue, PlayerStore,
    ReconnectInfo, SessionStatus, StoreError,
};

/// How often a lost WATCH race is retried before reporting `Conflict`.
/// Two players per room keeps contention low; three attempts is plenty.
const UPDATE_RETRIES: usize = 3;

/// Capacity of the channels fed by the subscriber pump tasks.
const SUBSCRIBER_BUFFER: usize = 64;

// ---------------------------------------------------------------------------
// GameStore
// ---------------------------------------------------------------------------

/// Room records as Redis hashes at `room:<id>`.
pub struct RedisGameStore {
    client: redis::Client,
}

impl RedisGameStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Decodes a room hash. An empty reply means the key does not exist.
    fn state_from_hash(
        room: &RoomId,
        hash: &HashMap<String, String>,
    ) -> Result<GameState, StoreError> {
        if hash.is_empty() {
            return Err(StoreError::RoomNotFound(room.clone()));
        }

        let field = |name: &str| -> Result<&str, StoreError> {
            hash.get(name)
                .map(String::as_str)
                .ok_or_else(|| StoreError::Corrupt(format!("missing field {name}")))
        };

        let board: Board = serde_json::from_str(field(FIELD_BOARD)?)?;
        let next_turn = Mark::parse(field(FIELD_NEXT_TURN)?).ok_or_else(|| {
            StoreError::Corrupt(format!("bad next_turn {:?}", hash.get(FIELD_NEXT_TURN)))
        })?;

        Ok(GameState {
            board,
            next_turn,
            winner: Winner::parse(field(FIELD_WINNER)?),
            status: GameStatus::parse(field(FIELD_STATUS)?),
            player_x: PlayerId::from(field(FIELD_PLAYER_X)?),
            player_o: PlayerId::from(field(FIELD_PLAYER_O)?),
        })
    }
}

#[async_trait]
impl GameStore for RedisGameStore {
    #[tracing::instrument(skip(self), fields(room_id = %room))]
    async fn create(
        &self,
        room: &RoomId,
        player_x: &PlayerId,
        player_o: &PlayerId,
    ) -> Result<(), StoreError> {
        let key = room_key(room);
        let board = serde_json::to_string(&Board::new())?;
        let first = Mark::random_first();

        let mut con = self.client.get_multiplexed_async_connection().await?;
        redis::pipe()
            .hset(&key, FIELD_BOARD, board)
            .ignore()
            .hset(&key, FIELD_PLAYER_X, player_x.as_str())
            .ignore()
            .hset(&key, FIELD_PLAYER_O, player_o.as_str())
            .ignore()
            .hset(&key, FIELD_NEXT_TURN, first.as_str())
            .ignore()
            .hset(&key, FIELD_WINNER, Winner::None.as_str())
            .ignore()
            .hset(&key, FIELD_STATUS, GameStatus::InProgress.as_str())
            .ignore()
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }

    async fn find(&self, room: &RoomId) -> Result<GameState, StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let hash: HashMap<String, String> = con.hgetall(room_key(room)).await?;
        Self::state_from_hash(room, &hash)
    }

    #[tracing::instrument(skip(self), fields(room_id = %room, mark = %mark, row, col))]
    async fn update(
        &self,
        room: &RoomId,
        mark: Mark,
        row: i64,
        col: i64,
    ) -> Result<GameState, StoreError> {
        let key = room_key(room);
        // WATCH is connection state, so the transaction gets its own
        // connection rather than the shared multiplexed one.
        let mut con = self.client.get_async_connection().await?;

        for _ in 0..UPDATE_RETRIES {
            redis::cmd("WATCH")
                .arg(&key)
                .query_async::<_, ()>(&mut con)
                .await?;

            let hash: HashMap<String, String> = con.hgetall(&key).await?;
            let read = Self::state_from_hash(room, &hash).and_then(|state| {
                let placed = validate_move(
                    &state.board,
                    row,
                    col,
                    mark,
                    state.next_turn,
                    state.status,
                )?;
                Ok((state, placed))
            });

            let (state, (r, c)) = match read {
                Ok(ok) => ok,
                Err(err) => {
                    redis::cmd("UNWATCH").query_async::<_, ()>(&mut con).await?;
                    return Err(err);
                }
            };

            let mut next = state;
            next.board.place(r, c, mark);
            next.next_turn = mark.opponent();
            next.winner = next.board.winner();
            next.status = if next.winner.is_decided() {
                GameStatus::Finished
            } else {
                GameStatus::InProgress
            };

            let board = serde_json::to_string(&next.board)?;
            let committed: Option<()> = redis::pipe()
                .atomic()
                .hset(&key, FIELD_BOARD, board)
                .ignore()
                .hset(&key, FIELD_NEXT_TURN, next.next_turn.as_str())
                .ignore()
                .hset(&key, FIELD_WINNER, next.winner.as_str())
                .ignore()
                .hset(&key, FIELD_STATUS, next.status.as_str())
                .ignore()
                .query_async(&mut con)
                .await?;

            match committed {
                Some(()) => return Ok(next),
                // The watched key changed under us; re-read and retry.
                None => continue,
            }
        }

        Err(StoreError::Conflict)
    }

    async fn record_vote(
        &self,
        room: &RoomId,
        voter: &PlayerId,
    ) -> Result<(), StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.hset::<_, _, _, ()>(room_key(room), vote_field(voter), "true")
            .await?;
        Ok(())
    }

    async fn get_votes(&self, room: &RoomId) -> Result<HashSet<PlayerId>, StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let hash: HashMap<String, String> = con.hgetall(room_key(room)).await?;
        Ok(hash
            .iter()
            .filter(|(_, value)| value.as_str() == "true")
            .filter_map(|(field, _)| vote_field_player(field))
            .collect())
    }

    async fn clear_votes(
        &self,
        room: &RoomId,
        player_x: &PlayerId,
        player_o: &PlayerId,
    ) -> Result<(), StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.hdel::<_, _, ()>(
            room_key(room),
            vec![vote_field(player_x), vote_field(player_o)],
        )
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PlayerStore
// ---------------------------------------------------------------------------

/// Player session hashes at `player:<id>`.
pub struct RedisPlayerStore {
    client: redis::Client,
}

impl RedisPlayerStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlayerStore for RedisPlayerStore {
    async fn find_for_reconnect(
        &self,
        player: &PlayerId,
    ) -> Result<ReconnectInfo, StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let hash: HashMap<String, String> = con.hgetall(player_key(player)).await?;

        Ok(ReconnectInfo {
            room_id: hash
                .get(FIELD_ROOM_ID)
                .filter(|id| !id.is_empty())
                .map(|id| RoomId::from(id.as_str())),
            connection: hash
                .get(FIELD_CONNECTION_STATUS)
                .and_then(|s| ConnectionStatus::parse(s)),
        })
    }

    #[tracing::instrument(skip(self), fields(player_id = %player))]
    async fn set_initial(
        &self,
        player: &PlayerId,
        home: &InstanceId,
    ) -> Result<(), StoreError> {
        let key = player_key(player);
        let mut con = self.client.get_multiplexed_async_connection().await?;
        redis::pipe()
            .hset(&key, FIELD_HOME_INSTANCE, home.as_str())
            .ignore()
            .hset(&key, FIELD_SESSION_STATUS, SessionStatus::Waiting.as_str())
            .ignore()
            .hset(
                &key,
                FIELD_CONNECTION_STATUS,
                ConnectionStatus::Connected.as_str(),
            )
            .ignore()
            .hset(&key, FIELD_ROOM_ID, "")
            .ignore()
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(player_id = %player, room_id = %room))]
    async fn set_for_match(
        &self,
        player: &PlayerId,
        room: &RoomId,
    ) -> Result<(), StoreError> {
        let key = player_key(player);
        let mut con = self.client.get_multiplexed_async_connection().await?;
        redis::pipe()
            .hset(&key, FIELD_ROOM_ID, room.as_str())
            .ignore()
            .hset(&key, FIELD_SESSION_STATUS, SessionStatus::InGame.as_str())
            .ignore()
            .hset(
                &key,
                FIELD_CONNECTION_STATUS,
                ConnectionStatus::Connected.as_str(),
            )
            .ignore()
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }

    async fn set_connection(
        &self,
        player: &PlayerId,
        status: ConnectionStatus,
    ) -> Result<(), StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.hset::<_, _, _, ()>(
            player_key(player),
            FIELD_CONNECTION_STATUS,
            status.as_str(),
        )
        .await?;
        Ok(())
    }

    async fn set_offline(&self, player: &PlayerId) -> Result<(), StoreError> {
        let key = player_key(player);
        let mut con = self.client.get_multiplexed_async_connection().await?;
        // The seat is forfeited: clearing room_id is what makes a later
        // return with this id a fresh registration, not a reconnection.
        redis::pipe()
            .hset(&key, FIELD_SESSION_STATUS, SessionStatus::Offline.as_str())
            .ignore()
            .hset(&key, FIELD_ROOM_ID, "")
            .ignore()
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MatchQueue
// ---------------------------------------------------------------------------

/// The shared FIFO at `queue:matchmaking`.
pub struct RedisMatchQueue {
    client: redis::Client,
}

impl RedisMatchQueue {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MatchQueue for RedisMatchQueue {
    async fn push(&self, player: &PlayerId) -> Result<(), StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.rpush::<_, _, ()>(MATCHMAKING_QUEUE, player.as_str())
            .await?;
        Ok(())
    }

    async fn pop_pair(&self) -> Result<(PlayerId, PlayerId), StoreError> {
        // BLPOP parks the connection, so the blocking pops get a
        // dedicated one instead of the shared multiplexed connection.
        let mut con = self.client.get_async_connection().await?;

        let (_, first): (String, String) = con.blpop(MATCHMAKING_QUEUE, 0.0).await?;
        tracing::debug!(player_id = %first, "matcher holds one player, waiting for a second");

        let second: Result<(String, String), redis::RedisError> =
            con.blpop(MATCHMAKING_QUEUE, 0.0).await;

        match second {
            Ok((_, second)) => Ok((PlayerId(first), PlayerId(second))),
            Err(err) => {
                // Do not strand the first player: best-effort re-push
                // before surfacing the error.
                tracing::warn!(player_id = %first, error = %err, "second pop failed, re-queuing first player");
                if let Err(requeue) = self.push(&PlayerId(first.clone())).await {
                    tracing::error!(player_id = %first, error = %requeue, "failed to re-queue player after pop error");
                }
                Err(err.into())
            }
        }
    }

    async fn remove(&self, player: &PlayerId) -> Result<(), StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        // Count 0 removes every occurrence.
        con.lrem::<_, _, ()>(MATCHMAKING_QUEUE, 0, player.as_str())
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Pub/sub over `channel:events` and `channel:room:<id>`.
pub struct RedisEventBus {
    client: redis::Client,
}

impl RedisEventBus {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, event: &Event) -> Result<(), StoreError> {
        let payload = serde_json::to_string(event)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.publish::<_, _, ()>(EVENTS_CHANNEL, payload).await?;
        Ok(())
    }

    async fn publish_room_wake(&self, room: &RoomId) -> Result<(), StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.publish::<_, _, ()>(room_channel(room), "").await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Event>, StoreError> {
        let mut pubsub = self.client.get_async_connection().await?.into_pubsub();
        pubsub.subscribe(EVENTS_CHANNEL).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::warn!(error = %err, "unreadable bus message, skipping");
                        continue;
                    }
                };
                match serde_json::from_str::<Event>(&payload) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break; // subscriber gone
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, payload, "undecodable event envelope, skipping");
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn subscribe_room(
        &self,
        room: &RoomId,
    ) -> Result<mpsc::Receiver<()>, StoreError> {
        let mut pubsub = self.client.get_async_connection().await?.into_pubsub();
        pubsub.subscribe(room_channel(room)).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(_msg) = messages.next().await {
                // Payload is deliberately empty — the wake itself is the
                // message; the receiver re-reads the store.
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}
