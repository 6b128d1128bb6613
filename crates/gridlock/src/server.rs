//! The WebSocket server and session endpoint.
//!
//! One accept loop; each socket is upgraded in-process (the upgrade
//! callback captures the request URI for the query string) and handed
//! to the hub as a registration. The endpoint:
//!
//! ```text
//! GET /api/ws?mode={human|bot}&difficulty={easy|medium|hard}&playerId={id?}
//! ```
//!
//! A missing `playerId` gets a server-minted uuid; a known, disconnected
//! `playerId` makes the registration a reconnection.

use std::sync::Arc;
use std::time::Duration;

use gridlock_bot::HeuristicStrategy;
use gridlock_protocol::PlayerId;
use gridlock_room::{Difficulty, Player, WsConnection};
use gridlock_store::Stores;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::{StatusCode, Uri};

use crate::hub::DEFAULT_MOVE_TIMEOUT;
use crate::{GameMode, GridlockError, Hub, HubHandle};

/// Builder for a [`GridlockServer`].
pub struct GridlockServerBuilder {
    bind_addr: String,
    move_timeout: Duration,
}

impl GridlockServerBuilder {
    pub fn new() -> GridlockServerBuilder {
        GridlockServerBuilder {
            bind_addr: "127.0.0.1:8080".to_string(),
            move_timeout: DEFAULT_MOVE_TIMEOUT,
        }
    }

    /// Sets the listen address. Use port 0 in tests.
    pub fn bind(mut self, addr: &str) -> GridlockServerBuilder {
        self.bind_addr = addr.to_string();
        self
    }

    /// Overrides the human-vs-human move timeout.
    pub fn move_timeout(mut self, timeout: Duration) -> GridlockServerBuilder {
        self.move_timeout = timeout;
        self
    }

    /// Binds the listener and assembles the hub over `stores`.
    pub async fn build(self, stores: Stores) -> Result<GridlockServer, GridlockError> {
        let listener = TcpListener::bind(&self.bind_addr)
            .await
            .map_err(GridlockError::Listener)?;
        tracing::info!(addr = %self.bind_addr, "listener bound");

        let (hub, handle) =
            Hub::new(stores, Arc::new(HeuristicStrategy), self.move_timeout).await?;

        Ok(GridlockServer {
            listener,
            hub,
            handle,
        })
    }
}

impl Default for GridlockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound, ready-to-run server instance.
pub struct GridlockServer {
    listener: TcpListener,
    hub: Hub,
    handle: HubHandle,
}

impl GridlockServer {
    pub fn builder() -> GridlockServerBuilder {
        GridlockServerBuilder::new()
    }

    /// The bound address (the real port when built with port 0).
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the hub and the accept loop until the process ends.
    pub async fn run(self) -> Result<(), GridlockError> {
        tokio::spawn(self.hub.run());

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!(%addr, "incoming connection");
                    let handle = self.handle.clone();
                    tokio::spawn(async move {
                        if let Err(err) = accept_session(stream, handle).await {
                            tracing::debug!(%addr, error = %err, "session setup failed");
                        }
                    });
                }
                Err(err) => {
                    tracing::error!(error = %err, "accept failed");
                }
            }
        }
    }
}

/// What the query string asked for.
#[derive(Debug, PartialEq, Eq)]
struct SessionParams {
    player_id: Option<PlayerId>,
    mode: GameMode,
    difficulty: Difficulty,
}

impl SessionParams {
    fn from_uri(uri: &Uri) -> SessionParams {
        let query = uri.query().unwrap_or("");
        let mut params = SessionParams {
            player_id: None,
            mode: GameMode::Human,
            difficulty: Difficulty::Medium,
        };

        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "playerId" if !value.is_empty() => {
                    params.player_id = Some(PlayerId::from(value));
                }
                "mode" => params.mode = GameMode::parse(value),
                "difficulty" => params.difficulty = Difficulty::parse(value),
                _ => {}
            }
        }
        params
    }
}

/// Upgrades one socket and registers the player with the hub.
async fn accept_session(
    stream: TcpStream,
    hub: HubHandle,
) -> Result<(), GridlockError> {
    let mut request_uri: Option<Uri> = None;
    let ws = tokio_tungstenite::accept_hdr_async(
        stream,
        |request: &Request, response: Response| {
            if request.uri().path() != "/api/ws" {
                let mut not_found = ErrorResponse::new(Some("not found".to_string()));
                *not_found.status_mut() = StatusCode::NOT_FOUND;
                return Err(not_found);
            }
            request_uri = Some(request.uri().clone());
            Ok(response)
        },
    )
    .await?;

    let params = request_uri
        .as_ref()
        .map(SessionParams::from_uri)
        .unwrap_or_else(|| SessionParams::from_uri(&Uri::from_static("/api/ws")));

    let player_id = params.player_id.unwrap_or_else(PlayerId::random);
    tracing::info!(
        player_id = %player_id,
        mode = ?params.mode,
        difficulty = params.difficulty.as_str(),
        "session upgraded"
    );

    let player = Player::new(player_id, WsConnection::new(ws));
    hub.register(player, params.mode, params.difficulty).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_session_params_full_query() {
        let params = SessionParams::from_uri(&uri(
            "/api/ws?mode=bot&difficulty=hard&playerId=p-123",
        ));
        assert_eq!(params.player_id, Some(PlayerId::from("p-123")));
        assert_eq!(params.mode, GameMode::Bot);
        assert_eq!(params.difficulty, Difficulty::Hard);
    }

    #[test]
    fn test_session_params_defaults() {
        let params = SessionParams::from_uri(&uri("/api/ws"));
        assert_eq!(params.player_id, None);
        assert_eq!(params.mode, GameMode::Human);
        assert_eq!(params.difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_session_params_unknown_values_fall_back() {
        let params = SessionParams::from_uri(&uri(
            "/api/ws?mode=spectator&difficulty=impossible&extra=1",
        ));
        assert_eq!(params.mode, GameMode::Human);
        assert_eq!(params.difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_session_params_empty_player_id_means_fresh() {
        let params = SessionParams::from_uri(&uri("/api/ws?playerId="));
        assert_eq!(params.player_id, None);
    }
}
