//! Cross-instance coordination events.
//!
//! Every instance subscribes to one well-known bus channel and reacts
//! to these envelopes. Events are *coordination, not state*: payloads
//! carry identity only, and handlers re-read the store for truth — a
//! lost or reordered event costs a UI hint at worst.
//!
//! Adjacent tagging produces the envelope shape the cluster speaks:
//! `{"event":"match_made","payload":{"room_id":...,"player_ids":[...]}}`.

use serde::{Deserialize, Serialize};

use crate::{PlayerId, RoomId};

/// An envelope published on the shared events channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum Event {
    /// The matcher paired two queued players into a fresh room. Each
    /// instance intersects `player_ids` with its local map and builds a
    /// surrogate if any are local.
    MatchMade {
        room_id: RoomId,
        player_ids: Vec<PlayerId>,
    },

    /// A player's socket dropped; their grace window is running.
    PlayerDisconnected {
        room_id: RoomId,
        player_id: PlayerId,
    },

    /// A player reclaimed their seat within the grace window.
    PlayerReconnected {
        room_id: RoomId,
        player_id: PlayerId,
    },

    /// A player voted for a rematch and the opponent has not yet.
    RematchRequested {
        room_id: RoomId,
        player_id: PlayerId,
    },

    /// Both seats voted; the room record has been reset with roles
    /// swapped. Surrogates resend assignments and state.
    RematchSuccessful { room_id: RoomId },
}

impl Event {
    /// The room this event concerns.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Event::MatchMade { room_id, .. }
            | Event::PlayerDisconnected { room_id, .. }
            | Event::PlayerReconnected { room_id, .. }
            | Event::RematchRequested { room_id, .. }
            | Event::RematchSuccessful { room_id } => room_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_match_made_envelope_shape() {
        let event = Event::MatchMade {
            room_id: RoomId::from("r1"),
            player_ids: vec![PlayerId::from("a"), PlayerId::from("b")],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "match_made",
                "payload": {"room_id": "r1", "player_ids": ["a", "b"]},
            })
        );
    }

    #[test]
    fn test_player_disconnected_envelope_shape() {
        let event = Event::PlayerDisconnected {
            room_id: RoomId::from("r1"),
            player_id: PlayerId::from("a"),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "player_disconnected",
                "payload": {"room_id": "r1", "player_id": "a"},
            })
        );
    }

    #[test]
    fn test_rematch_successful_envelope_shape() {
        let event = Event::RematchSuccessful {
            room_id: RoomId::from("r1"),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "rematch_successful",
                "payload": {"room_id": "r1"},
            })
        );
    }

    #[test]
    fn test_every_variant_round_trips() {
        let events = [
            Event::MatchMade {
                room_id: RoomId::from("r"),
                player_ids: vec![PlayerId::from("a"), PlayerId::from("b")],
            },
            Event::PlayerDisconnected {
                room_id: RoomId::from("r"),
                player_id: PlayerId::from("a"),
            },
            Event::PlayerReconnected {
                room_id: RoomId::from("r"),
                player_id: PlayerId::from("a"),
            },
            Event::RematchRequested {
                room_id: RoomId::from("r"),
                player_id: PlayerId::from("a"),
            },
            Event::RematchSuccessful {
                room_id: RoomId::from("r"),
            },
        ];
        for event in events {
            let bytes = serde_json::to_vec(&event).unwrap();
            let decoded: Event = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(event, decoded);
            assert_eq!(decoded.room_id(), &RoomId::from("r"));
        }
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let result: Result<Event, _> = serde_json::from_str(
            r#"{"event":"server_gossip","payload":{"room_id":"r"}}"#,
        );
        assert!(result.is_err());
    }
}
