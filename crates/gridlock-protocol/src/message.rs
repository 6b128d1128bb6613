//! Client/server WebSocket frames.
//!
//! Both directions are internally tagged on `"type"` with snake_case
//! tags, so a move frame is `{"type":"move","position":[0,2]}` and an
//! update is `{"type":"update","board":[[...]],"next":"O","winner":""}`.

use gridlock_rules::{Board, Mark, Winner};
use serde::{Deserialize, Serialize};

/// A frame sent by a client (or synthesized by the server on a
/// player's behalf — proxy moves and bot moves take this same shape so
/// they run through the same validation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Place the sender's mark. `position` is `[row, col]`; the values
    /// stay signed so out-of-range input is rejected by validation
    /// rather than by deserialization quirks.
    Move { position: [i64; 2] },

    /// Vote to restart the finished game.
    Rematch,
}

impl ClientMessage {
    /// Builds a move frame from coordinates.
    pub fn new_move(row: i64, col: i64) -> ClientMessage {
        ClientMessage::Move {
            position: [row, col],
        }
    }
}

/// A frame sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Tells a player which mark they hold. Sent once at game start and
    /// again after every rematch reset (marks swap).
    Assignment { mark: Mark },

    /// The full authoritative game state. Clients render exactly this;
    /// `winner` is `""` while the game is running.
    Update {
        board: Board,
        next: Mark,
        winner: Winner,
    },

    /// The other seat's socket dropped; they may still come back.
    OpponentDisconnected,

    /// The other seat reclaimed their socket within the grace window.
    OpponentReconnected,

    /// The other seat asked for a rematch — a UI hint, nothing more.
    RematchRequested,
}

#[cfg(test)]
mod tests {
    //! The wire shapes are consumed by browser clients; each variant is
    //! pinned to its exact JSON form.

    use gridlock_rules::Cell;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_move_frame_deserializes_from_wire_shape() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"move","position":[0,2]}"#).unwrap();
        assert_eq!(msg, ClientMessage::Move { position: [0, 2] });
    }

    #[test]
    fn test_move_frame_keeps_negative_positions_for_validation() {
        // Deserialization must not mask an out-of-range move; the rules
        // layer is the one that rejects it.
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"move","position":[-1,0]}"#).unwrap();
        assert_eq!(msg, ClientMessage::Move { position: [-1, 0] });
    }

    #[test]
    fn test_rematch_frame_deserializes_from_wire_shape() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"rematch"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Rematch);
    }

    #[test]
    fn test_move_frame_with_wrong_arity_is_rejected() {
        let three: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"move","position":[0,1,2]}"#);
        assert!(three.is_err());

        let one: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"move","position":[0]}"#);
        assert!(one.is_err());
    }

    #[test]
    fn test_unknown_frame_type_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"chat","text":"hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result: Result<ClientMessage, _> = serde_json::from_str("not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_assignment_serializes_with_mark_letter() {
        let msg = ServerMessage::Assignment { mark: Mark::X };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "assignment", "mark": "X"}));
    }

    #[test]
    fn test_update_serializes_full_state() {
        let mut board = Board::new();
        board.place(0, 0, Mark::X);
        let msg = ServerMessage::Update {
            board,
            next: Mark::O,
            winner: Winner::None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "update",
                "board": [["X", "", ""], ["", "", ""], ["", "", ""]],
                "next": "O",
                "winner": "",
            })
        );
    }

    #[test]
    fn test_update_carries_draw_winner() {
        let msg = ServerMessage::Update {
            board: Board::new(),
            next: Mark::X,
            winner: Winner::Draw,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["winner"], "Draw");
    }

    #[test]
    fn test_notice_frames_serialize_as_bare_type() {
        let value = serde_json::to_value(ServerMessage::OpponentDisconnected).unwrap();
        assert_eq!(value, json!({"type": "opponent_disconnected"}));

        let value = serde_json::to_value(ServerMessage::OpponentReconnected).unwrap();
        assert_eq!(value, json!({"type": "opponent_reconnected"}));

        let value = serde_json::to_value(ServerMessage::RematchRequested).unwrap();
        assert_eq!(value, json!({"type": "rematch_requested"}));
    }

    #[test]
    fn test_update_round_trips_through_bot_decode_path() {
        // Bot agents decode ServerMessage from the broadcast bytes.
        let mut board = Board::new();
        board.place(1, 1, Mark::O);
        let msg = ServerMessage::Update {
            board,
            next: Mark::X,
            winner: Winner::None,
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_slice(&bytes).unwrap();
        match decoded {
            ServerMessage::Update { board, .. } => {
                assert_eq!(board.get(1, 1), Cell::O);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }
}
