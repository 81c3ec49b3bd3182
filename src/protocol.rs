//! Wire protocol - JSON text frames shaped `{"type": ..., "data": ...}`
//!
//! Inbound frames are decoded once, at the connection boundary, into
//! [`ClientMessage`]; everything the world emits is a [`ServerMessage`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mob::{MobType, Rarity};
use crate::snapshot::{DropView, PetalView, StateSnapshot};
use crate::world::{MobId, PetalId};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unknown message type: {0}")]
    UnknownKind(String),
    #[error("Binary frames are not supported")]
    BinaryFrame,
}

// ============================================================================
// Inbound
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Movement intent; normalized server-side
    Move { dx: f64, dy: f64 },
    Respawn,
    Ping,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct MoveData {
    dx: f64,
    dy: f64,
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        match raw.kind.as_str() {
            "move" => {
                let MoveData { dx, dy } = serde_json::from_value(raw.data)?;
                Ok(ClientMessage::Move { dx, dy })
            }
            "respawn" => Ok(ClientMessage::Respawn),
            "ping" => Ok(ClientMessage::Ping),
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }
}

// ============================================================================
// Outbound
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortalTeleport {
    pub from_portal: String,
    pub to_portal: String,
    pub from_zone: String,
    pub to_zone: String,
    /// Seconds until portals work again for this player
    pub cooldown: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    State(StateSnapshot),
    PortalTeleport(PortalTeleport),
    DamageTaken {
        mob_id: MobId,
        damage: i32,
        health: i32,
    },
    PlayerDied {
        killed_by: MobId,
    },
    MobKilled {
        mob_id: MobId,
        mob_type: MobType,
        rarity: Rarity,
    },
    MobKilledByPetal {
        mob_id: MobId,
        mob_type: MobType,
        rarity: Rarity,
        petal_id: PetalId,
    },
    PetalDropCreated(DropView),
    PetalPickedUp(PetalView),
    PetalDestroyed {
        petal_id: PetalId,
        /// Seconds until the petal revives
        revive_in: f64,
    },
    PetalRespawned {
        petal_id: PetalId,
    },
    PetalHealed {
        petal_id: PetalId,
        amount: i32,
        health: i32,
    },
    Pong,
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }

    /// Wire name of this message kind
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::State(_) => "state",
            ServerMessage::PortalTeleport(_) => "portal_teleport",
            ServerMessage::DamageTaken { .. } => "damage_taken",
            ServerMessage::PlayerDied { .. } => "player_died",
            ServerMessage::MobKilled { .. } => "mob_killed",
            ServerMessage::MobKilledByPetal { .. } => "mob_killed_by_petal",
            ServerMessage::PetalDropCreated(_) => "petal_drop_created",
            ServerMessage::PetalPickedUp(_) => "petal_picked_up",
            ServerMessage::PetalDestroyed { .. } => "petal_destroyed",
            ServerMessage::PetalRespawned { .. } => "petal_respawned",
            ServerMessage::PetalHealed { .. } => "petal_healed",
            ServerMessage::Pong => "pong",
            ServerMessage::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_decode_move() {
        let msg = ClientMessage::decode(r#"{"type":"move","data":{"dx":1,"dy":-0.5}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Move { dx: 1.0, dy: -0.5 });
    }

    #[test]
    fn test_decode_unit_commands() {
        assert_eq!(ClientMessage::decode(r#"{"type":"ping"}"#).unwrap(), ClientMessage::Ping);
        assert_eq!(
            ClientMessage::decode(r#"{"type":"respawn","data":null}"#).unwrap(),
            ClientMessage::Respawn
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            ClientMessage::decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"move","data":{"dx":"fast"}}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"dance"}"#),
            Err(ProtocolError::UnknownKind(k)) if k == "dance"
        ));
    }

    #[test]
    fn test_encode_teleport_shape() {
        let msg = ServerMessage::PortalTeleport(PortalTeleport {
            from_portal: "P1".into(),
            to_portal: "P2".into(),
            from_zone: "common".into(),
            to_zone: "uncommon".into(),
            cooldown: 10,
        });
        let json: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["type"], "portal_teleport");
        assert_eq!(json["data"]["to_portal"], "P2");
        assert_eq!(json["data"]["cooldown"], 10);
    }

    #[test]
    fn test_encode_kind_tags_match() {
        let messages = [
            ServerMessage::DamageTaken { mob_id: 1, damage: 8, health: 92 },
            ServerMessage::MobKilled { mob_id: 2, mob_type: MobType::Orc, rarity: Rarity::Epic },
            ServerMessage::PetalRespawned { petal_id: 3 },
            ServerMessage::error("bad token"),
            ServerMessage::Pong,
        ];
        for msg in messages {
            let json: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
            assert_eq!(json["type"], msg.kind());
        }
    }

    #[test]
    fn test_mob_enums_lowercase_on_wire() {
        let msg = ServerMessage::MobKilled { mob_id: 2, mob_type: MobType::Wolf, rarity: Rarity::Legendary };
        let json: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["data"]["mob_type"], "wolf");
        assert_eq!(json["data"]["rarity"], "legendary");
    }
}
