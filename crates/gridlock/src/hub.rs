//! The per-instance hub.
//!
//! One hub per process owns the `local_players` and `local_rooms` maps.
//! Everything that touches them — registration, unregistration, and
//! cluster events — arrives on channels and is applied by the single
//! [`Hub::run`] loop, so the maps have exactly one writer and no locks.
//! The matcher and the bus subscriber pump run as separate tasks and
//! never see the maps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gridlock_bot::BotAgent;
use gridlock_protocol::{Event, InstanceId, PlayerId, RoomId, ServerMessage};
use gridlock_room::{
    spawn_reader, update_frame, Difficulty, OpponentStrategy, Player, Room,
};
use gridlock_store::{
    ConnectionStatus, EventBus, GameStore, MatchQueue, PlayerStore, Stores,
};
use tokio::sync::mpsc;

use crate::matcher::spawn_matcher;
use crate::GridlockError;

/// Move timeout for human-vs-human rooms.
pub(crate) const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(15);

/// What the session endpoint asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    Human,
    Bot,
}

impl GameMode {
    /// Lenient parse for query-string input.
    pub fn parse(s: &str) -> GameMode {
        match s {
            "bot" => GameMode::Bot,
            _ => GameMode::Human,
        }
    }
}

/// A freshly upgraded connection waiting to be placed.
pub struct RegistrationRequest {
    pub player: Arc<Player>,
    pub mode: GameMode,
    pub difficulty: Difficulty,
}

enum HubCommand {
    Register(RegistrationRequest),
    Unregister(PlayerId),
}

/// Cheap handle for feeding the hub from connection handlers and tests.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Hands a new player to the hub. The hub decides whether this is a
    /// fresh registration, a reconnection, or a bot match.
    pub async fn register(
        &self,
        player: Arc<Player>,
        mode: GameMode,
        difficulty: Difficulty,
    ) {
        let request = RegistrationRequest {
            player,
            mode,
            difficulty,
        };
        if self.commands.send(HubCommand::Register(request)).await.is_err() {
            tracing::error!("hub is gone, dropping registration");
        }
    }

    /// Explicitly removes a player (tests, admin tooling). Grace expiry
    /// takes the same path internally.
    pub async fn unregister(&self, player: PlayerId) {
        let _ = self.commands.send(HubCommand::Unregister(player)).await;
    }
}

/// The instance registry and event dispatcher.
pub struct Hub {
    instance_id: InstanceId,
    stores: Stores,
    strategy: Arc<dyn OpponentStrategy>,
    move_timeout: Duration,
    local_players: HashMap<PlayerId, Arc<Player>>,
    local_rooms: HashMap<RoomId, Arc<Room>>,
    commands: mpsc::Receiver<HubCommand>,
    events: mpsc::Receiver<Event>,
    unregister_tx: mpsc::Sender<PlayerId>,
    unregister_rx: mpsc::Receiver<PlayerId>,
}

impl Hub {
    /// Builds the hub and subscribes to the cluster event channel.
    /// Subscription failure here is a bootstrap failure.
    pub async fn new(
        stores: Stores,
        strategy: Arc<dyn OpponentStrategy>,
        move_timeout: Duration,
    ) -> Result<(Hub, HubHandle), GridlockError> {
        let events = stores.bus.subscribe().await?;
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (unregister_tx, unregister_rx) = mpsc::channel(64);

        let hub = Hub {
            instance_id: InstanceId::random(),
            stores,
            strategy,
            move_timeout,
            local_players: HashMap::new(),
            local_rooms: HashMap::new(),
            commands: commands_rx,
            events,
            unregister_tx,
            unregister_rx,
        };
        let handle = HubHandle {
            commands: commands_tx,
        };
        Ok((hub, handle))
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Runs the hub until every input channel closes. Spawns the
    /// matcher alongside.
    pub async fn run(mut self) {
        tracing::info!(instance_id = %self.instance_id, "hub started");
        spawn_matcher(self.stores.clone());

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(HubCommand::Register(request)) => {
                        self.handle_register(request).await;
                    }
                    Some(HubCommand::Unregister(player)) => {
                        self.handle_unregister(&player).await;
                    }
                    None => break,
                },

                Some(player) = self.unregister_rx.recv() => {
                    self.handle_unregister(&player).await;
                }

                Some(event) = self.events.recv() => {
                    self.handle_event(event).await;
                }
            }
        }

        tracing::info!(instance_id = %self.instance_id, "hub stopped");
    }

    // -- Registration -------------------------------------------------------

    #[tracing::instrument(
        skip(self, request),
        fields(instance_id = %self.instance_id, player_id = %request.player.id())
    )]
    async fn handle_register(&mut self, request: RegistrationRequest) {
        let player = request.player.clone();
        tracing::info!("registration received");

        self.local_players
            .insert(player.id().clone(), player.clone());

        let info = match self.stores.players.find_for_reconnect(player.id()).await {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!(error = %err, "reconnect lookup failed, dropping registration");
                return;
            }
        };

        if let Some(room_id) = info.reconnection_room().cloned() {
            self.handle_reconnection(player, room_id).await;
            return;
        }

        if let Err(err) = self
            .stores
            .players
            .set_initial(player.id(), &self.instance_id)
            .await
        {
            tracing::warn!(error = %err, "failed to write initial player state");
            return;
        }

        match request.mode {
            GameMode::Bot => self.register_bot_game(player, request.difficulty).await,
            GameMode::Human => self.queue_for_match(&player).await,
        }
    }

    /// A disconnected seat reclaims its room: attach the fresh socket,
    /// flip the stored status, tell the cluster, and re-send the world.
    async fn handle_reconnection(&mut self, player: Arc<Player>, room_id: RoomId) {
        tracing::info!(
            player_id = %player.id(),
            room_id = %room_id,
            "reconnection within grace window"
        );

        let room = self.ensure_room(room_id.clone(), self.move_timeout).await;
        room.attach(player.clone());
        spawn_reader(
            player.clone(),
            room_id.clone(),
            room.inbox(),
            self.stores.players.clone(),
            self.stores.bus.clone(),
        );

        if let Err(err) = self
            .stores
            .players
            .set_connection(player.id(), ConnectionStatus::Connected)
            .await
        {
            tracing::warn!(player_id = %player.id(), error = %err, "failed to record reconnect");
        }

        let event = Event::PlayerReconnected {
            room_id: room_id.clone(),
            player_id: player.id().clone(),
        };
        if let Err(err) = self.stores.bus.publish(&event).await {
            tracing::warn!(error = %err, "failed to publish reconnect event");
        }

        self.send_initial_state(&room, &[player]).await;
    }

    /// Fresh human registration: scrub any stale queue entry, then wait
    /// in line.
    async fn queue_for_match(&self, player: &Arc<Player>) {
        if let Err(err) = self.stores.queue.remove(player.id()).await {
            tracing::warn!(player_id = %player.id(), error = %err, "stale queue scrub failed");
        }
        if let Err(err) = self.stores.queue.push(player.id()).await {
            tracing::warn!(player_id = %player.id(), error = %err, "failed to queue player");
            return;
        }
        tracing::info!(player_id = %player.id(), "queued for matchmaking");
    }

    /// Bot match: the room is assembled entirely locally — the human,
    /// a synthetic seat wired to a [`BotAgent`], and a move timeout
    /// derived from the chosen difficulty.
    async fn register_bot_game(&mut self, player: Arc<Player>, difficulty: Difficulty) {
        let room_id = RoomId::random();
        let move_timeout = match difficulty {
            Difficulty::Hard => Duration::from_secs(5),
            Difficulty::Easy => Duration::from_secs(15),
            Difficulty::Medium => Duration::from_secs(10),
        };
        tracing::info!(
            player_id = %player.id(),
            room_id = %room_id,
            difficulty = difficulty.as_str(),
            "creating bot match"
        );

        let room = self.build_room(room_id.clone(), move_timeout);
        let bot_id = PlayerId::random_bot();
        let agent = BotAgent::new(
            bot_id.clone(),
            difficulty,
            self.strategy.clone(),
            room.inbox(),
        );
        let bot = Player::new_bot(bot_id.clone(), agent);

        if let Err(err) = self
            .stores
            .games
            .create(&room_id, player.id(), &bot_id)
            .await
        {
            tracing::warn!(room_id = %room_id, error = %err, "failed to create bot game record");
            return;
        }
        if let Err(err) = self
            .stores
            .players
            .set_for_match(player.id(), &room_id)
            .await
        {
            tracing::warn!(player_id = %player.id(), error = %err, "failed to seat player");
        }

        room.attach(player.clone());
        room.attach(bot);
        self.start_room(room.clone());
        spawn_reader(
            player.clone(),
            room_id,
            room.inbox(),
            self.stores.players.clone(),
            self.stores.bus.clone(),
        );

        let players = room.players();
        self.send_initial_state(&room, &players).await;
    }

    // -- Unregistration -----------------------------------------------------

    #[tracing::instrument(skip(self), fields(instance_id = %self.instance_id, player_id = %player))]
    async fn handle_unregister(&mut self, player: &PlayerId) {
        tracing::info!("unregistering player");

        self.local_players.remove(player);

        if let Err(err) = self.stores.queue.remove(player).await {
            tracing::warn!(error = %err, "failed to remove player from queue");
        }
        if let Err(err) = self.stores.players.set_offline(player).await {
            tracing::warn!(error = %err, "failed to mark player offline");
        }

        // Detach from their surrogate; tear it down once empty.
        let mut emptied = Vec::new();
        for (room_id, room) in &self.local_rooms {
            if room.player(player).is_some() && room.detach(player) {
                emptied.push(room_id.clone());
            }
        }
        for room_id in emptied {
            if let Some(room) = self.local_rooms.remove(&room_id) {
                room.stop();
                tracing::info!(room_id = %room_id, "last local player left, surrogate torn down");
            }
        }
    }

    // -- Cluster events -----------------------------------------------------

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::MatchMade {
                room_id,
                player_ids,
            } => self.handle_match_made(room_id, &player_ids).await,

            Event::PlayerDisconnected { room_id, player_id } => {
                tracing::info!(room_id = %room_id, player_id = %player_id, "opponent disconnected");
                if let Some(room) = self.local_rooms.get(&room_id) {
                    room.broadcast(&ServerMessage::OpponentDisconnected).await;
                }
            }

            Event::PlayerReconnected { room_id, player_id } => {
                tracing::info!(room_id = %room_id, player_id = %player_id, "opponent reconnected");
                if let Some(room) = self.local_rooms.get(&room_id) {
                    room.broadcast(&ServerMessage::OpponentReconnected).await;
                }
            }

            Event::RematchRequested { room_id, player_id } => {
                self.forward_rematch_hint(&room_id, &player_id).await;
            }

            Event::RematchSuccessful { room_id } => {
                if let Some(room) = self.local_rooms.get(&room_id).cloned() {
                    tracing::info!(room_id = %room_id, "rematch reset, re-sending assignments");
                    let players = room.players();
                    self.send_initial_state(&room, &players).await;
                }
            }
        }
    }

    /// Any payload player homed here gets a surrogate with readers and
    /// the opening assignment + state.
    async fn handle_match_made(&mut self, room_id: RoomId, player_ids: &[PlayerId]) {
        let locals: Vec<Arc<Player>> = player_ids
            .iter()
            .filter_map(|id| self.local_players.get(id).cloned())
            .collect();
        if locals.is_empty() {
            return;
        }

        tracing::info!(
            room_id = %room_id,
            local_players = locals.len(),
            "match made with local players, building surrogate"
        );

        let room = self.ensure_room(room_id.clone(), self.move_timeout).await;
        for player in &locals {
            room.attach(player.clone());
            spawn_reader(
                player.clone(),
                room_id.clone(),
                room.inbox(),
                self.stores.players.clone(),
                self.stores.bus.clone(),
            );
        }

        self.send_initial_state(&room, &locals).await;
    }

    /// The requester is remote; the seat that has not voted is local.
    async fn forward_rematch_hint(&self, room_id: &RoomId, requester: &PlayerId) {
        let Some(room) = self.local_rooms.get(room_id) else {
            return;
        };
        let Ok(frame) = serde_json::to_vec(&ServerMessage::RematchRequested) else {
            return;
        };
        for player in room.players() {
            if player.id() == requester || !player.is_connected() {
                continue;
            }
            if let Err(err) = player.conn().send(&frame).await {
                tracing::debug!(player_id = %player.id(), error = %err, "rematch hint write failed");
            }
        }
    }

    // -- Room plumbing ------------------------------------------------------

    /// The local surrogate for `room_id`, building and starting one if
    /// this room is new to the instance.
    async fn ensure_room(&mut self, room_id: RoomId, move_timeout: Duration) -> Arc<Room> {
        if let Some(room) = self.local_rooms.get(&room_id) {
            return room.clone();
        }
        let room = self.build_room(room_id, move_timeout);
        self.start_room(room.clone());
        room
    }

    fn build_room(&mut self, room_id: RoomId, move_timeout: Duration) -> Arc<Room> {
        let room = Room::new(
            room_id.clone(),
            self.stores.games.clone(),
            self.stores.bus.clone(),
            self.strategy.clone(),
            move_timeout,
            self.unregister_tx.clone(),
        );
        self.local_rooms.insert(room_id, room.clone());
        room
    }

    /// Spawns the command loop and the room-channel subscriber.
    fn start_room(&self, room: Arc<Room>) {
        tokio::spawn(room.clone().run());
        crate::events::spawn_room_subscriber(
            room,
            self.stores.games.clone(),
            self.stores.bus.clone(),
        );
    }

    /// Sends each listed player their mark, then broadcasts the current
    /// state to the whole surrogate.
    async fn send_initial_state(&self, room: &Arc<Room>, players: &[Arc<Player>]) {
        let state = match self.stores.games.find(room.id()).await {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(room_id = %room.id(), error = %err, "cannot read state for assignment");
                return;
            }
        };

        for player in players {
            let Some(mark) = state.mark_of(player.id()) else {
                continue;
            };
            let Ok(frame) = serde_json::to_vec(&ServerMessage::Assignment { mark })
            else {
                continue;
            };
            if let Err(err) = player.conn().send(&frame).await {
                tracing::warn!(player_id = %player.id(), error = %err, "assignment write failed");
            }
        }

        room.broadcast(&update_frame(&state)).await;
    }
}
