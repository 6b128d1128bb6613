//! Identity newtypes.
//!
//! Ids are opaque strings everywhere — uuid-shaped when this server
//! mints them, whatever the user API minted otherwise. Wrapping them
//! keeps a `RoomId` from being passed where a `PlayerId` belongs even
//! though both are strings underneath, and `#[serde(transparent)]`
//! keeps the wire form a bare string.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A player's identity, assigned by the user API or minted on first
/// connect. Bots get a `bot-` prefixed short id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Mints a fresh uuid-v4 id for a connection that arrived without one.
    pub fn random() -> PlayerId {
        PlayerId(Uuid::new_v4().to_string())
    }

    /// Mints a synthetic id for a bot seat, e.g. `bot-1a2b3c4d`.
    pub fn random_bot() -> PlayerId {
        let uuid = Uuid::new_v4().to_string();
        PlayerId(format!("bot-{}", &uuid[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> PlayerId {
        PlayerId(s.to_string())
    }
}

/// The id of one authoritative room record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Mints a fresh uuid-v4 room id.
    pub fn random() -> RoomId {
        RoomId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> RoomId {
        RoomId(s.to_string())
    }
}

/// The id of one server process. Every instance mints its own at boot
/// and records it as each local player's home instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn random() -> InstanceId {
        InstanceId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_bare_string() {
        let id = PlayerId::from("abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
    }

    #[test]
    fn test_player_id_deserializes_from_bare_string() {
        let id: PlayerId = serde_json::from_str("\"abc-123\"").unwrap();
        assert_eq!(id, PlayerId::from("abc-123"));
    }

    #[test]
    fn test_random_ids_are_unique() {
        assert_ne!(PlayerId::random(), PlayerId::random());
        assert_ne!(RoomId::random(), RoomId::random());
    }

    #[test]
    fn test_random_bot_id_is_prefixed_and_short() {
        let id = PlayerId::random_bot();
        assert!(id.as_str().starts_with("bot-"));
        assert_eq!(id.as_str().len(), "bot-".len() + 8);
    }

    #[test]
    fn test_ids_work_as_map_keys() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(PlayerId::from("a"), 1);
        map.insert(PlayerId::from("b"), 2);
        assert_eq!(map[&PlayerId::from("a")], 1);
    }
}
