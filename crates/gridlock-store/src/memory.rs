//! In-memory implementations of the store seams.
//!
//! Used by the test suites and for single-node development runs. The
//! contracts match the Redis backend: updates are atomic per room,
//! queue pops block FIFO, and the bus delivers at-most-once to current
//! subscribers.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use gridlock_protocol::{Event, InstanceId, PlayerId, RoomId};
use gridlock_rules::{validate_move, Board, GameStatus, Mark, Winner};
use tokio::sync::{broadcast, mpsc, Notify};

use crate::{
    ConnectionStatus, EventBus, GameState, GameStore, MatchQueue, PlayerStore,
    ReconnectInfo, SessionStatus, StoreError,
};

// ---------------------------------------------------------------------------
// GameStore
// ---------------------------------------------------------------------------

struct RoomRecord {
    state: GameState,
    votes: HashSet<PlayerId>,
}

/// Room records in a process-local map. One lock per store makes every
/// update trivially atomic, which is the same observable contract the
/// WATCH transaction provides.
#[derive(Default)]
pub struct MemoryGameStore {
    rooms: Mutex<HashMap<RoomId, RoomRecord>>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn create(
        &self,
        room: &RoomId,
        player_x: &PlayerId,
        player_o: &PlayerId,
    ) -> Result<(), StoreError> {
        let state = GameState {
            board: Board::new(),
            next_turn: Mark::random_first(),
            winner: Winner::None,
            status: GameStatus::InProgress,
            player_x: player_x.clone(),
            player_o: player_o.clone(),
        };
        let mut rooms = self.rooms.lock().expect("game store lock");
        // Overwrite the state, keep any vote markers for clear_votes —
        // same as HSET on an existing hash.
        let votes = rooms
            .remove(room)
            .map(|record| record.votes)
            .unwrap_or_default();
        rooms.insert(room.clone(), RoomRecord { state, votes });
        Ok(())
    }

    async fn find(&self, room: &RoomId) -> Result<GameState, StoreError> {
        let rooms = self.rooms.lock().expect("game store lock");
        rooms
            .get(room)
            .map(|record| record.state.clone())
            .ok_or_else(|| StoreError::RoomNotFound(room.clone()))
    }

    async fn update(
        &self,
        room: &RoomId,
        mark: Mark,
        row: i64,
        col: i64,
    ) -> Result<GameState, StoreError> {
        let mut rooms = self.rooms.lock().expect("game store lock");
        let record = rooms
            .get_mut(room)
            .ok_or_else(|| StoreError::RoomNotFound(room.clone()))?;

        let state = &mut record.state;
        let (r, c) =
            validate_move(&state.board, row, col, mark, state.next_turn, state.status)?;

        state.board.place(r, c, mark);
        state.next_turn = mark.opponent();
        state.winner = state.board.winner();
        state.status = if state.winner.is_decided() {
            GameStatus::Finished
        } else {
            GameStatus::InProgress
        };
        Ok(state.clone())
    }

    async fn record_vote(
        &self,
        room: &RoomId,
        voter: &PlayerId,
    ) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().expect("game store lock");
        let record = rooms
            .get_mut(room)
            .ok_or_else(|| StoreError::RoomNotFound(room.clone()))?;
        record.votes.insert(voter.clone());
        Ok(())
    }

    async fn get_votes(&self, room: &RoomId) -> Result<HashSet<PlayerId>, StoreError> {
        let rooms = self.rooms.lock().expect("game store lock");
        rooms
            .get(room)
            .map(|record| record.votes.clone())
            .ok_or_else(|| StoreError::RoomNotFound(room.clone()))
    }

    async fn clear_votes(
        &self,
        room: &RoomId,
        player_x: &PlayerId,
        player_o: &PlayerId,
    ) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().expect("game store lock");
        if let Some(record) = rooms.get_mut(room) {
            record.votes.remove(player_x);
            record.votes.remove(player_o);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PlayerStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct PlayerRecord {
    #[allow(dead_code)]
    home: InstanceId,
    room_id: Option<RoomId>,
    status: SessionStatus,
    connection: ConnectionStatus,
}

/// Player session records in a process-local map.
#[derive(Default)]
pub struct MemoryPlayerStore {
    records: Mutex<HashMap<PlayerId, PlayerRecord>>,
}

impl MemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: the recorded session status, if any.
    pub fn session_status(&self, player: &PlayerId) -> Option<SessionStatus> {
        let records = self.records.lock().expect("player store lock");
        records.get(player).map(|r| r.status)
    }
}

#[async_trait]
impl PlayerStore for MemoryPlayerStore {
    async fn find_for_reconnect(
        &self,
        player: &PlayerId,
    ) -> Result<ReconnectInfo, StoreError> {
        let records = self.records.lock().expect("player store lock");
        Ok(records
            .get(player)
            .map(|record| ReconnectInfo {
                room_id: record.room_id.clone(),
                connection: Some(record.connection),
            })
            .unwrap_or_default())
    }

    async fn set_initial(
        &self,
        player: &PlayerId,
        home: &InstanceId,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("player store lock");
        records.insert(
            player.clone(),
            PlayerRecord {
                home: home.clone(),
                room_id: None,
                status: SessionStatus::Waiting,
                connection: ConnectionStatus::Connected,
            },
        );
        Ok(())
    }

    async fn set_for_match(
        &self,
        player: &PlayerId,
        room: &RoomId,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("player store lock");
        if let Some(record) = records.get_mut(player) {
            record.room_id = Some(room.clone());
            record.status = SessionStatus::InGame;
            record.connection = ConnectionStatus::Connected;
        }
        Ok(())
    }

    async fn set_connection(
        &self,
        player: &PlayerId,
        status: ConnectionStatus,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("player store lock");
        if let Some(record) = records.get_mut(player) {
            record.connection = status;
        }
        Ok(())
    }

    async fn set_offline(&self, player: &PlayerId) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("player store lock");
        if let Some(record) = records.get_mut(player) {
            record.status = SessionStatus::Offline;
            // Forfeit the seat; a later return is a fresh registration.
            record.room_id = None;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MatchQueue
// ---------------------------------------------------------------------------

/// FIFO queue with blocking pops, process-local.
#[derive(Default)]
pub struct MemoryMatchQueue {
    items: Mutex<VecDeque<PlayerId>>,
    ready: Notify,
}

impl MemoryMatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: a snapshot of the queue contents, head first.
    pub fn snapshot(&self) -> Vec<PlayerId> {
        self.items.lock().expect("queue lock").iter().cloned().collect()
    }

    async fn pop_one(&self) -> PlayerId {
        loop {
            // Arm the notification before checking, so a push landing
            // between the check and the await is not missed.
            let notified = self.ready.notified();
            if let Some(player) = self.items.lock().expect("queue lock").pop_front() {
                return player;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl MatchQueue for MemoryMatchQueue {
    async fn push(&self, player: &PlayerId) -> Result<(), StoreError> {
        self.items.lock().expect("queue lock").push_back(player.clone());
        self.ready.notify_one();
        Ok(())
    }

    async fn pop_pair(&self) -> Result<(PlayerId, PlayerId), StoreError> {
        let first = self.pop_one().await;
        let second = self.pop_one().await;
        Ok((first, second))
    }

    async fn remove(&self, player: &PlayerId) -> Result<(), StoreError> {
        self.items
            .lock()
            .expect("queue lock")
            .retain(|queued| queued != player);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast-channel bus, process-local. Subscribing after a publish
/// misses the message, matching pub/sub semantics.
pub struct MemoryEventBus {
    events: broadcast::Sender<Event>,
    rooms: Mutex<HashMap<RoomId, broadcast::Sender<()>>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    fn room_sender(&self, room: &RoomId) -> broadcast::Sender<()> {
        let mut rooms = self.rooms.lock().expect("bus lock");
        rooms
            .entry(room.clone())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Bridges a broadcast receiver into the mpsc receiver the trait hands
/// out. Lagged subscribers skip ahead — loss is part of the contract.
fn pump<T: Clone + Send + 'static>(
    mut source: broadcast::Receiver<T>,
) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        loop {
            match source.recv().await {
                Ok(item) => {
                    if tx.send(item).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    rx
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: &Event) -> Result<(), StoreError> {
        // No subscribers is fine — fire and forget.
        let _ = self.events.send(event.clone());
        Ok(())
    }

    async fn publish_room_wake(&self, room: &RoomId) -> Result<(), StoreError> {
        let _ = self.room_sender(room).send(());
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Event>, StoreError> {
        Ok(pump(self.events.subscribe()))
    }

    async fn subscribe_room(
        &self,
        room: &RoomId,
    ) -> Result<mpsc::Receiver<()>, StoreError> {
        Ok(pump(self.room_sender(room).subscribe()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
