//! The per-room command loop.
//!
//! One task per surrogate arbitrates everything that happens to the
//! room on this instance: inbound frames, the move timer, heartbeats,
//! and the grace sweep. All dispatch runs under one mutex, so move
//! effects are linearizable inside the instance; across instances the
//! store's optimistic transaction is the arbiter.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use gridlock_protocol::{ClientMessage, Event, PlayerId, RoomId, ServerMessage};
use gridlock_store::{EventBus, GameState, GameStore};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::MissedTickBehavior;

use crate::{Difficulty, OpponentStrategy, Player};

/// Liveness pings go out on every connected local socket at this rate.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// How long a disconnected player may reclaim their seat, and the
/// cadence of the sweep that evicts those who did not.
pub const RECONNECT_GRACE: Duration = Duration::from_secs(60);

/// When the local-turn player is disconnected, their timer shrinks to
/// this so the proxy acts promptly instead of stalling the opponent for
/// a full move timeout.
const DISCONNECTED_TURN_TIMEOUT: Duration = Duration::from_secs(1);

/// Inbox capacity; senders briefly backpressure if the loop lags.
const INBOX_CAPACITY: usize = 16;

/// A raw frame attributed to a local player.
pub type Inbound = (PlayerId, Vec<u8>);

/// Resolves after `timeout`, or never when the timer is unarmed (the
/// turn belongs to a remote instance, or the game is over).
async fn arm(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Builds the `update` frame for a state snapshot.
pub fn update_frame(state: &GameState) -> ServerMessage {
    ServerMessage::Update {
        board: state.board,
        next: state.next_turn,
        winner: state.winner,
    }
}

/// A per-instance surrogate for one authoritative room.
pub struct Room {
    id: RoomId,
    players: StdMutex<Vec<Arc<Player>>>,
    inbox_tx: mpsc::Sender<Inbound>,
    inbox_rx: Mutex<Option<mpsc::Receiver<Inbound>>>,
    unregister_tx: mpsc::Sender<PlayerId>,
    games: Arc<dyn GameStore>,
    bus: Arc<dyn EventBus>,
    strategy: Arc<dyn OpponentStrategy>,
    move_timeout: Duration,
    /// Serializes message dispatch; together with the single command
    /// loop this makes per-room effects linearizable on this instance.
    dispatch: Mutex<()>,
    stop: watch::Sender<bool>,
}

impl Room {
    pub fn new(
        id: RoomId,
        games: Arc<dyn GameStore>,
        bus: Arc<dyn EventBus>,
        strategy: Arc<dyn OpponentStrategy>,
        move_timeout: Duration,
        unregister_tx: mpsc::Sender<PlayerId>,
    ) -> Arc<Room> {
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let (stop, _) = watch::channel(false);
        Arc::new(Room {
            id,
            players: StdMutex::new(Vec::with_capacity(2)),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
            unregister_tx,
            games,
            bus,
            strategy,
            move_timeout,
            dispatch: Mutex::new(()),
            stop,
        })
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// The sender side of the inbox — readers and bot agents feed it.
    pub fn inbox(&self) -> mpsc::Sender<Inbound> {
        self.inbox_tx.clone()
    }

    /// Adds a local player, replacing any previous entry with the same
    /// id (reconnection swaps in the fresh socket).
    pub fn attach(&self, player: Arc<Player>) {
        let mut players = self.players.lock().expect("players lock");
        if let Some(existing) = players.iter_mut().find(|p| p.id() == player.id()) {
            *existing = player;
        } else {
            players.push(player);
        }
    }

    /// Removes a local player; returns `true` if the surrogate is now
    /// empty and should be torn down.
    pub fn detach(&self, player: &PlayerId) -> bool {
        let mut players = self.players.lock().expect("players lock");
        players.retain(|p| p.id() != player);
        players.is_empty()
    }

    /// Snapshot of the locally present players.
    pub fn players(&self) -> Vec<Arc<Player>> {
        self.players.lock().expect("players lock").clone()
    }

    /// The local player with this id, if present.
    pub fn player(&self, id: &PlayerId) -> Option<Arc<Player>> {
        let players = self.players.lock().expect("players lock");
        players.iter().find(|p| p.id() == id).cloned()
    }

    /// Signals the command loop and every subscriber task to exit.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// A receiver that resolves when [`stop`](Room::stop) fires; the
    /// room-channel subscriber selects on it.
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Runs the command loop until stopped. Spawned once per surrogate.
    pub async fn run(self: Arc<Self>) {
        let mut inbox = self
            .inbox_rx
            .lock()
            .await
            .take()
            .expect("room loop started twice");
        let mut stop = self.stop.subscribe();
        if *stop.borrow() {
            // Stopped before the loop task got scheduled.
            return;
        }

        // First interval tick fires after one period, not immediately.
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
            HEARTBEAT_INTERVAL,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut grace_sweep = tokio::time::interval_at(
            tokio::time::Instant::now() + RECONNECT_GRACE,
            RECONNECT_GRACE,
        );
        grace_sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(room_id = %self.id, "room loop started");

        loop {
            // Every iteration re-reads truth; events and timers only
            // decide *when* to look, never *what* is true.
            let state = match self.games.find(&self.id).await {
                Ok(state) => state,
                Err(err) => {
                    tracing::error!(
                        room_id = %self.id,
                        error = %err,
                        "room loop cannot read game state, closing room"
                    );
                    for player in self.players() {
                        let _ = self.unregister_tx.send(player.id().clone()).await;
                    }
                    return;
                }
            };

            let local_turn = self.local_turn_player(&state);
            let timer = if state.is_finished() {
                None
            } else {
                match &local_turn {
                    Some(p) if p.is_connected() => Some(self.move_timeout),
                    Some(_) => Some(DISCONNECTED_TURN_TIMEOUT),
                    // The remote instance owns this turn's timer.
                    None => None,
                }
            };

            tokio::select! {
                _ = stop.changed() => {
                    tracing::info!(room_id = %self.id, "room loop stopped");
                    return;
                }

                inbound = inbox.recv() => match inbound {
                    Some((sender, frame)) => {
                        self.handle_message(&sender, &frame).await;
                    }
                    // Every sender handle dropped; the surrogate is
                    // being torn down.
                    None => return,
                },

                _ = arm(timer) => {
                    if let Some(player) = local_turn {
                        self.proxy_move(&state, &player).await;
                    }
                }

                _ = heartbeat.tick() => self.send_heartbeats().await,

                _ = grace_sweep.tick() => self.sweep_grace_expired().await,
            }
        }
    }

    /// The local player who owns `next_turn`, if any.
    fn local_turn_player(&self, state: &GameState) -> Option<Arc<Player>> {
        self.players()
            .into_iter()
            .find(|p| state.mark_of(p.id()) == Some(state.next_turn))
    }

    /// Dispatches one raw frame from a local player.
    #[tracing::instrument(skip(self, raw), fields(room_id = %self.id, player_id = %sender))]
    pub async fn handle_message(&self, sender: &PlayerId, raw: &[u8]) {
        let _guard = self.dispatch.lock().await;

        let Some(player) = self.player(sender) else {
            tracing::debug!("frame from player not in this room, dropping");
            return;
        };
        if !player.is_connected() {
            tracing::debug!("frame from disconnected player, dropping");
            return;
        }

        let message: ClientMessage = match serde_json::from_slice(raw) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(error = %err, "malformed frame, dropping");
                return;
            }
        };

        match message {
            ClientMessage::Move {
                position: [row, col],
            } => self.handle_move(&player, row, col).await,
            ClientMessage::Rematch => self.handle_rematch(&player).await,
        }
    }

    async fn handle_move(&self, player: &Arc<Player>, row: i64, col: i64) {
        let state = match self.games.find(&self.id).await {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(room_id = %self.id, error = %err, "cannot read state for move");
                return;
            }
        };

        let Some(mark) = state.mark_of(player.id()) else {
            tracing::debug!(
                room_id = %self.id,
                player_id = %player.id(),
                "move from id not seated in room, dropping"
            );
            return;
        };

        match self.games.update(&self.id, mark, row, col).await {
            Ok(_) => {
                // Wake every surrogate (this one included) to re-read
                // and rebroadcast. The payload is deliberately empty.
                if let Err(err) = self.bus.publish_room_wake(&self.id).await {
                    tracing::warn!(room_id = %self.id, error = %err, "failed to publish room wake");
                }
            }
            Err(err) if err.is_rejected_move() => {
                // Never advance state, never blame the other player.
                tracing::debug!(
                    room_id = %self.id,
                    player_id = %player.id(),
                    reason = %err,
                    "move rejected, dropping"
                );
            }
            Err(err) => {
                tracing::warn!(room_id = %self.id, error = %err, "store error applying move");
            }
        }
    }

    async fn handle_rematch(&self, player: &Arc<Player>) {
        let state = match self.games.find(&self.id).await {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(room_id = %self.id, error = %err, "cannot read state for rematch");
                return;
            }
        };

        if !state.is_finished() {
            tracing::debug!(
                room_id = %self.id,
                player_id = %player.id(),
                "rematch requested before game over, dropping"
            );
            return;
        }

        if let Err(err) = self.games.record_vote(&self.id, player.id()).await {
            tracing::warn!(room_id = %self.id, error = %err, "failed to record rematch vote");
            return;
        }

        // A local bot opponent accepts on the spot.
        let bot_opponent = self
            .players()
            .iter()
            .any(|p| p.id() != player.id() && p.is_bot());
        if bot_opponent {
            tracing::info!(room_id = %self.id, "bot auto-accepts rematch");
            self.reset_for_rematch().await;
            return;
        }

        let votes = match self.games.get_votes(&self.id).await {
            Ok(votes) => votes,
            Err(err) => {
                tracing::warn!(room_id = %self.id, error = %err, "failed to read rematch votes");
                return;
            }
        };

        if votes.contains(&state.player_x) && votes.contains(&state.player_o) {
            tracing::info!(room_id = %self.id, "both players voted, resetting game");
            self.reset_for_rematch().await;
        } else {
            let event = Event::RematchRequested {
                room_id: self.id.clone(),
                player_id: player.id().clone(),
            };
            if let Err(err) = self.bus.publish(&event).await {
                tracing::warn!(room_id = %self.id, error = %err, "failed to publish rematch request");
            }
        }
    }

    /// Resets the record with seats swapped (previous O opens as X),
    /// clears the votes, and announces the new game to the cluster.
    async fn reset_for_rematch(&self) {
        let old = match self.games.find(&self.id).await {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(room_id = %self.id, error = %err, "cannot read state for rematch reset");
                return;
            }
        };

        if let Err(err) = self
            .games
            .create(&self.id, &old.player_o, &old.player_x)
            .await
        {
            tracing::warn!(room_id = %self.id, error = %err, "failed to reset game for rematch");
            return;
        }

        if let Err(err) = self
            .games
            .clear_votes(&self.id, &old.player_x, &old.player_o)
            .await
        {
            tracing::warn!(room_id = %self.id, error = %err, "failed to clear rematch votes");
        }

        let event = Event::RematchSuccessful {
            room_id: self.id.clone(),
        };
        if let Err(err) = self.bus.publish(&event).await {
            tracing::warn!(room_id = %self.id, error = %err, "failed to publish rematch success");
        }
    }

    /// The move timer expired with a local-turn player present: play on
    /// their behalf. The synthesized frame takes the normal dispatch
    /// path so every validation still runs.
    async fn proxy_move(&self, state: &GameState, player: &Arc<Player>) {
        if state.is_finished() {
            return;
        }
        let Some(mark) = state.mark_of(player.id()) else {
            return;
        };

        let Some((row, col)) =
            self.strategy
                .next_move(&state.board, mark, Difficulty::Medium)
        else {
            return;
        };

        tracing::info!(
            room_id = %self.id,
            player_id = %player.id(),
            row,
            col,
            "turn timed out, playing proxy move"
        );

        // Straight into move handling under the dispatch lock: the
        // store still validates everything, but the presence check is
        // skipped — it guards stale client sockets, and a proxy move
        // exists precisely because the player may be gone.
        let _guard = self.dispatch.lock().await;
        self.handle_move(player, row as i64, col as i64).await;
    }

    async fn send_heartbeats(&self) {
        for player in self.players() {
            if !player.is_connected() {
                continue;
            }
            if let Err(err) = player.conn().ping().await {
                tracing::debug!(
                    player_id = %player.id(),
                    error = %err,
                    "heartbeat failed, reader will pick up the disconnect"
                );
            }
        }
    }

    /// Emits every local player whose grace window has lapsed on the
    /// unregister channel; the hub evicts them.
    async fn sweep_grace_expired(&self) {
        for player in self.players() {
            let expired = player
                .disconnected_for()
                .is_some_and(|gone| gone > RECONNECT_GRACE);
            if expired {
                tracing::info!(
                    room_id = %self.id,
                    player_id = %player.id(),
                    "reconnection grace elapsed, unregistering"
                );
                if self.unregister_tx.send(player.id().clone()).await.is_err() {
                    tracing::warn!(room_id = %self.id, "hub unregister channel closed");
                }
            }
        }
    }

    /// Serializes once and writes to every connected local player.
    /// Failures are logged and skipped — the reader discovers dead
    /// sockets independently.
    pub async fn broadcast(&self, msg: &ServerMessage) {
        let data = match serde_json::to_vec(msg) {
            Ok(data) => data,
            Err(err) => {
                tracing::error!(room_id = %self.id, error = %err, "unserializable broadcast");
                return;
            }
        };

        for player in self.players() {
            if !player.is_connected() {
                continue;
            }
            if let Err(err) = player.conn().send(&data).await {
                tracing::debug!(
                    room_id = %self.id,
                    player_id = %player.id(),
                    error = %err,
                    "broadcast write failed"
                );
            }
        }
    }
}
