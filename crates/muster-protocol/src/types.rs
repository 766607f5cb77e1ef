//! Core protocol types: identities, host authority, payloads, envelopes.
//!
//! Every type here travels on the wire in some form. The shapes are
//! fixed by serde attributes and pinned by the tests at the bottom of
//! this module; a mismatch means client SDKs can't parse the server.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::GameCode;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected client.
///
/// Client ids are small positive integers handed out by the transport
/// layer. An id appears in at most one room's member table at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// HostId — who holds host authority
// ---------------------------------------------------------------------------

/// The identity currently holding host authority in a room.
///
/// Host identity is a tagged union, never an overloaded integer: the
/// server sentinel and the absence of a host must be impossible to
/// confuse with a real client id.
///
/// Note there is deliberately no "everyone" variant here. Addressing
/// every member individually is a broadcast-targeting mode of the
/// host-update notification, not a host identity, and lives in the
/// room layer where it can't be stored as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum HostId {
    /// No host assigned yet.
    Nobody,

    /// The authority itself is host (server-as-host mode).
    Server,

    /// A real, currently-joined client.
    Client(ClientId),
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nobody => write!(f, "nobody"),
            Self::Server => write!(f, "[Server]"),
            Self::Client(id) => write!(f, "{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Reason codes
// ---------------------------------------------------------------------------

/// Why a client was removed from a room (or the room from the client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    None,
    GameFull,
    GameStarted,
    GameNotFound,
    IncorrectVersion,
    Banned,
    Kicked,
    InvalidName,
    Hacking,
    Destroy,
    Error,
    ServerRequest,
    ServerFull,
    Custom,
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverReason {
    HumansByVote,
    HumansByTask,
    ImpostorByVote,
    ImpostorByKill,
    ImpostorBySabotage,
    ImpostorDisconnect,
    HumansDisconnect,
}

// ---------------------------------------------------------------------------
// Cosmetics
// ---------------------------------------------------------------------------

/// Player body colors. Consumed by the color-change audit hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Pink,
    Orange,
    Yellow,
    Black,
    White,
    Purple,
    Brown,
    Cyan,
    Lime,
    Maroon,
    Rose,
    Banana,
    Gray,
    Tan,
    Coral,
}

// ---------------------------------------------------------------------------
// Game settings
// ---------------------------------------------------------------------------

/// The maps a lobby can be configured to play on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GameMap {
    #[default]
    Skeld,
    MiraHq,
    Polus,
    Airship,
}

/// Lobby configuration.
///
/// Opaque to the session authority beyond being stored and
/// broadcastable; the game simulation interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    pub max_players: u8,
    pub map: GameMap,
    pub num_impostors: u8,
    pub emergency_meetings: u8,
    /// Seconds of discussion before voting opens.
    pub discussion_time: u32,
    /// Seconds of voting. 0 means unlimited.
    pub voting_time: u32,
    pub kill_cooldown: f32,
    pub confirm_ejects: bool,
    pub anonymous_votes: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_players: 10,
            map: GameMap::Skeld,
            num_impostors: 1,
            emergency_meetings: 1,
            discussion_time: 15,
            voting_time: 120,
            kill_cooldown: 45.0,
            confirm_ejects: true,
            anonymous_votes: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// An opaque game-data payload, relayed by the room without inspection.
///
/// The bytes are whatever the game simulation's own codec produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GamePayload(pub Vec<u8>);

/// The catalogue of protocol payloads a room emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RootMessage {
    /// The room's code was assigned or changed.
    RoomCodeSet { code: GameCode },

    /// The room itself is going away.
    RoomRemoved { reason: DisconnectReason },

    /// A client joined; names the current host so the recipient knows
    /// where authority sits.
    PeerJoined {
        code: GameCode,
        client: ClientId,
        host: HostId,
    },

    /// A client was removed, with the host after the removal.
    PeerRemoved {
        code: GameCode,
        client: ClientId,
        reason: DisconnectReason,
        host: HostId,
    },

    /// Sent to a client that tried to join after the game ended: hold
    /// on until the host returns and reopens the lobby.
    WaitForHost { code: GameCode, client: ClientId },

    /// Join confirmation: the recipient is now part of the room.
    GameJoined {
        code: GameCode,
        client: ClientId,
        host: HostId,
        members: Vec<ClientId>,
    },

    /// The game started.
    GameStarted { code: GameCode },

    /// The game ended. `should_close` tells clients whether the room
    /// is also going away immediately.
    GameEnded {
        code: GameCode,
        reason: GameOverReason,
        should_close: bool,
    },

    /// Room-wide relay of opaque game data.
    GameData {
        code: GameCode,
        payloads: Vec<GamePayload>,
    },

    /// Game data relayed to a single recipient.
    GameDataTo {
        code: GameCode,
        target: ClientId,
        payloads: Vec<GamePayload>,
    },
}

// ---------------------------------------------------------------------------
// Packet — the envelope
// ---------------------------------------------------------------------------

/// The envelope around one frame's payloads.
///
/// Reliable packets carry the connection's next sequence number so the
/// transport can ack and retransmit them. A packet never carries zero
/// payloads; the room suppresses empty frames before they get here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Packet {
    Reliable {
        nonce: u64,
        payloads: Vec<RootMessage>,
    },
    Unreliable {
        payloads: Vec<RootMessage>,
    },
}

impl Packet {
    /// The payloads inside this envelope, whichever kind it is.
    pub fn payloads(&self) -> &[RootMessage] {
        match self {
            Self::Reliable { payloads, .. } | Self::Unreliable { payloads } => payloads,
        }
    }

    /// Returns `true` for the reliable, sequence-numbered envelope.
    pub fn is_reliable(&self) -> bool {
        matches!(self, Self::Reliable { .. })
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Wire-shape tests. The JSON forms here are the contract with
    //! client SDKs; serde attribute changes that alter them are bugs.

    use super::*;

    // =====================================================================
    // ClientId
    // =====================================================================

    #[test]
    fn test_client_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&ClientId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_client_id_deserializes_from_plain_number() {
        let id: ClientId = serde_json::from_str("42").unwrap();
        assert_eq!(id, ClientId(42));
    }

    #[test]
    fn test_client_id_display() {
        assert_eq!(ClientId(7).to_string(), "C-7");
    }

    // =====================================================================
    // HostId
    // =====================================================================

    #[test]
    fn test_host_id_nobody_json_format() {
        let json: serde_json::Value = serde_json::to_value(HostId::Nobody).unwrap();
        assert_eq!(json["type"], "Nobody");
    }

    #[test]
    fn test_host_id_client_json_format() {
        let json: serde_json::Value = serde_json::to_value(HostId::Client(ClientId(5))).unwrap();
        assert_eq!(json["type"], "Client");
        assert_eq!(json["id"], 5);
    }

    #[test]
    fn test_host_id_round_trip() {
        for host in [HostId::Nobody, HostId::Server, HostId::Client(ClientId(3))] {
            let bytes = serde_json::to_vec(&host).unwrap();
            let decoded: HostId = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(host, decoded);
        }
    }

    #[test]
    fn test_host_id_display() {
        assert_eq!(HostId::Nobody.to_string(), "nobody");
        assert_eq!(HostId::Server.to_string(), "[Server]");
        assert_eq!(HostId::Client(ClientId(9)).to_string(), "C-9");
    }

    // =====================================================================
    // RootMessage — one shape test per interesting variant
    // =====================================================================

    #[test]
    fn test_peer_joined_json_format() {
        let msg = RootMessage::PeerJoined {
            code: GameCode(1145258561),
            client: ClientId(4),
            host: HostId::Client(ClientId(1)),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "PeerJoined");
        assert_eq!(json["code"], 1145258561);
        assert_eq!(json["client"], 4);
        assert_eq!(json["host"]["type"], "Client");
    }

    #[test]
    fn test_peer_removed_round_trip() {
        let msg = RootMessage::PeerRemoved {
            code: GameCode(1145258561),
            client: ClientId(4),
            reason: DisconnectReason::Kicked,
            host: HostId::Server,
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: RootMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_game_joined_lists_members() {
        let msg = RootMessage::GameJoined {
            code: GameCode(1),
            client: ClientId(2),
            host: HostId::Client(ClientId(1)),
            members: vec![ClientId(1), ClientId(2)],
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "GameJoined");
        assert_eq!(json["members"], serde_json::json!([1, 2]));
    }

    #[test]
    fn test_wait_for_host_round_trip() {
        let msg = RootMessage::WaitForHost {
            code: GameCode(7),
            client: ClientId(3),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: RootMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_game_ended_json_format() {
        let msg = RootMessage::GameEnded {
            code: GameCode(7),
            reason: GameOverReason::HumansByTask,
            should_close: false,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "GameEnded");
        assert_eq!(json["reason"], "HumansByTask");
        assert_eq!(json["should_close"], false);
    }

    #[test]
    fn test_game_data_to_round_trip() {
        let msg = RootMessage::GameDataTo {
            code: GameCode(7),
            target: ClientId(2),
            payloads: vec![GamePayload(vec![1, 2, 3])],
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: RootMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_game_payload_serializes_as_plain_bytes() {
        let json = serde_json::to_string(&GamePayload(vec![10, 20])).unwrap();
        assert_eq!(json, "[10,20]");
    }

    // =====================================================================
    // Packet
    // =====================================================================

    #[test]
    fn test_reliable_packet_json_format() {
        let packet = Packet::Reliable {
            nonce: 3,
            payloads: vec![RootMessage::GameStarted { code: GameCode(7) }],
        };
        let json: serde_json::Value = serde_json::to_value(&packet).unwrap();

        assert_eq!(json["type"], "Reliable");
        assert_eq!(json["nonce"], 3);
        assert_eq!(json["payloads"][0]["type"], "GameStarted");
    }

    #[test]
    fn test_unreliable_packet_has_no_nonce() {
        let packet = Packet::Unreliable {
            payloads: vec![RootMessage::GameStarted { code: GameCode(7) }],
        };
        let json: serde_json::Value = serde_json::to_value(&packet).unwrap();

        assert_eq!(json["type"], "Unreliable");
        assert!(json.get("nonce").is_none());
    }

    #[test]
    fn test_packet_payload_accessors() {
        let packet = Packet::Reliable {
            nonce: 1,
            payloads: vec![RootMessage::GameStarted { code: GameCode(7) }],
        };
        assert!(packet.is_reliable());
        assert_eq!(packet.payloads().len(), 1);
    }

    // =====================================================================
    // GameSettings
    // =====================================================================

    #[test]
    fn test_game_settings_defaults() {
        let settings = GameSettings::default();
        assert_eq!(settings.max_players, 10);
        assert_eq!(settings.num_impostors, 1);
        assert_eq!(settings.map, GameMap::Skeld);
    }

    #[test]
    fn test_game_settings_round_trip() {
        let settings = GameSettings {
            map: GameMap::Polus,
            num_impostors: 2,
            ..GameSettings::default()
        };
        let bytes = serde_json::to_vec(&settings).unwrap();
        let decoded: GameSettings = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(settings, decoded);
    }

    // =====================================================================
    // Malformed input
    // =====================================================================

    #[test]
    fn test_decode_unknown_message_type_returns_error() {
        let unknown = r#"{"type": "FlyToMoon", "speed": 9000}"#;
        let result: Result<RootMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"not json at all";
        let result: Result<Packet, _> = serde_json::from_slice(garbage);
        assert!(result.is_err());
    }
}
