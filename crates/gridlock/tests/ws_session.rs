//! End-to-end tests over real WebSockets: a server bound to port 0,
//! clients connected with `tokio-tungstenite`, full games played
//! through the session endpoint.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gridlock::prelude::*;
use tokio_tungstenite::tungstenite::Message;

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn start_server() -> (String, Stores) {
    let stores = Stores::in_memory();
    let server = GridlockServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(stores.clone())
        .await
        .expect("server binds to an ephemeral port");
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    (addr, stores)
}

async fn connect(addr: &str, query: &str) -> Ws {
    let (ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws?{query}"))
            .await
            .expect("upgrade succeeds");
    ws
}

async fn send(ws: &mut Ws, msg: &ClientMessage) {
    let frame = serde_json::to_string(msg).unwrap();
    ws.send(Message::Text(frame.into())).await.unwrap();
}

/// The next decodable server frame (skips pings).
async fn recv(ws: &mut Ws) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("server frame expected")
            .expect("stream open")
            .expect("read ok");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("frames decode")
            }
            Message::Binary(data) => {
                return serde_json::from_slice(&data).expect("frames decode")
            }
            _ => continue,
        }
    }
}

async fn recv_assignment(ws: &mut Ws) -> Mark {
    loop {
        if let ServerMessage::Assignment { mark } = recv(ws).await {
            return mark;
        }
    }
}

async fn recv_update(ws: &mut Ws) -> (Board, Mark, Winner) {
    loop {
        if let ServerMessage::Update {
            board,
            next,
            winner,
        } = recv(ws).await
        {
            return (board, next, winner);
        }
    }
}

/// One move with both clients draining the broadcast.
async fn play(
    mover: &mut Ws,
    other: &mut Ws,
    row: i64,
    col: i64,
) -> (Board, Mark, Winner) {
    send(mover, &ClientMessage::new_move(row, col)).await;
    let seen = recv_update(mover).await;
    let _ = recv_update(other).await;
    seen
}

#[tokio::test]
async fn test_full_game_over_real_sockets() {
    let (addr, stores) = start_server().await;

    let mut p1 = connect(&addr, "mode=human&playerId=ws-alice").await;
    let mut p2 = connect(&addr, "mode=human&playerId=ws-bob").await;

    // Matchmaking: both clients get a mark and the empty opening board.
    let m1 = recv_assignment(&mut p1).await;
    let m2 = recv_assignment(&mut p2).await;
    assert_ne!(m1, m2);
    let (board, _, winner) = recv_update(&mut p1).await;
    assert_eq!(board, Board::new());
    assert_eq!(winner, Winner::None);
    let _ = recv_update(&mut p2).await;

    // Sort out seats and the opening turn from the store.
    let room = stores
        .players
        .find_for_reconnect(&PlayerId::from("ws-alice"))
        .await
        .unwrap()
        .room_id
        .expect("alice is seated");
    let (mut x, mut o) = if m1 == Mark::X { (p1, p2) } else { (p2, p1) };
    if stores.games.find(&room).await.unwrap().next_turn == Mark::O {
        let _ = play(&mut o, &mut x, 2, 0).await;
    }

    // X takes the top row.
    let _ = play(&mut x, &mut o, 0, 0).await;
    let _ = play(&mut o, &mut x, 1, 0).await;
    let _ = play(&mut x, &mut o, 0, 1).await;
    let _ = play(&mut o, &mut x, 1, 1).await;
    let (board, _, winner) = play(&mut x, &mut o, 0, 2).await;

    assert_eq!(winner, Winner::X);
    assert_eq!(board.get(0, 2), Cell::X);

    // The record agrees with what the clients saw.
    let state = stores.games.find(&room).await.unwrap();
    assert!(state.is_finished());
    assert_eq!(state.winner, Winner::X);
}

#[tokio::test]
async fn test_server_assigns_player_id_when_missing() {
    let (addr, _stores) = start_server().await;

    // No playerId in the query: the session still works — a bot match
    // proves the server minted an id and seated it.
    let mut ws = connect(&addr, "mode=bot&difficulty=easy").await;
    let _mark = recv_assignment(&mut ws).await;
    let (board, _, _) = recv_update(&mut ws).await;
    assert_eq!(board, Board::new());
}

#[tokio::test]
async fn test_unknown_path_is_rejected() {
    let (addr, _stores) = start_server().await;

    let result =
        tokio_tungstenite::connect_async(format!("ws://{addr}/definitely-not-ws"))
            .await;
    assert!(result.is_err(), "only /api/ws upgrades");
}
