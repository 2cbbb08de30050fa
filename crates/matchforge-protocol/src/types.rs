//! Core protocol types for Matchforge's wire format.
//!
//! Every type in this module travels "on the wire": it is serialized to
//! bytes by a [`Codec`](crate::Codec), sent over a connection, and
//! deserialized on the other side. The room and matchmaking layers also
//! use the identity types ([`PlayerId`], [`RoomId`], [`Slot`],
//! [`GameMode`]) as their map keys.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's identity, as issued by the identity provider.
///
/// The server never interprets it: it is an opaque string that stays
/// stable for the lifetime of a session. It is a newtype so a player ID
/// can't be confused with any other string (a token, a mode name).
///
/// `#[serde(transparent)]` serializes it as the bare string, so
/// `PlayerId("alice".into())` becomes `"alice"` in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Creates a player ID from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw identity string.
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
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A unique identifier for a room (one match).
///
/// Room IDs are allocated monotonically by the registry and wrap around
/// at the end of the `u32` range.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// A player's fixed seat in a room, `0..capacity`.
///
/// Slots are assigned in pairing order when the room is created and never
/// change for the room's lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Slot(pub u32);

impl Slot {
    /// The slot as an index into per-slot arrays.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A matchmaking mode. Each mode has its own queue and party size.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameMode(pub u32);

impl GameMode {
    /// The mode every server supports out of the box (1v1).
    pub const DEFAULT: GameMode = GameMode(0);
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Room payloads
// ---------------------------------------------------------------------------

/// Who sits in a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub slot: Slot,
    pub player_id: PlayerId,
}

/// The full roster of a room, sent to every slot when the room fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDetail {
    pub room_size: u32,
    pub players: Vec<PlayerInfo>,
}

/// Where a player has been seated: the answer to a successful match
/// and to a room check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomAssignment {
    pub room_id: RoomId,
    pub slot: Slot,
}

// ---------------------------------------------------------------------------
// SystemMessage
// ---------------------------------------------------------------------------

/// Messages used by the server itself (everything except relayed game data).
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
///   `{ "type": "JoinQueue", "mode": 0 }`
/// which is easy to switch on from any client language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    // -- Connection lifecycle --

    /// Client → Server: first frame on every connection. `token` is
    /// handed to the identity provider.
    Handshake { version: u32, token: String },

    /// Server → Client: the identity the token resolved to.
    HandshakeAck {
        player_id: PlayerId,
        server_time: u64,
    },

    /// Either direction: "I'm closing this connection."
    Disconnect { reason: String },

    // -- Heartbeat (keep-alive) --

    /// Client → Server: "I'm still here."
    Heartbeat { client_time: u64 },

    /// Server → Client: echo of the client's clock plus the server's.
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    // -- Matchmaking --

    /// Client → Server: "Queue me for a match in this mode."
    JoinQueue { mode: GameMode },

    /// Client → Server: "Take me out of the queue."
    CancelQueue,

    /// Server → Client: the queue entry was removed (or already gone).
    QueueCancelled,

    /// Server → Client: "You've been paired; connect to this room/slot."
    Matched { room_id: RoomId, slot: Slot },

    /// Server → Client: pairing happened but the room could not be created.
    MatchUnavailable,

    /// Client → Server: "Am I currently seated in a room?"
    CheckRoom,

    /// Server → Client: answer to `CheckRoom`.
    RoomStatus { assignment: Option<RoomAssignment> },

    // -- Room session --

    /// Client → Server: "Attach this connection to my slot."
    /// After this, `Game` payloads are relayed to the rest of the room.
    EnterRoom { room_id: RoomId, slot: Slot },

    /// Server → Client: a player attached to (`connected: true`) or
    /// detached from their slot.
    PlayerConnection {
        player: PlayerInfo,
        connected: bool,
    },

    /// Server → Client: every slot is attached; here is the roster.
    RoomDetail(RoomDetail),

    // -- Errors --

    /// Server → Client: "Something went wrong."
    /// `code` follows HTTP-style conventions (400 = bad request,
    /// 401 = unauthorized, 404 = not found, 409 = conflict, etc.).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// The content of a frame: a system message, or opaque game data.
///
/// `#[serde(tag = "type", content = "data")]` produces adjacently tagged
/// JSON, so the server can tell the two apart without touching the game
/// bytes:
///   `{ "type": "Game", "data": [104, 105] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// A server-level message.
    System(SystemMessage),

    /// Game data, relayed verbatim to the other players in the room.
    Game(Vec<u8>),
}

/// The top-level frame. Every message on the wire is an Envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number.
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,

    /// The actual content.
    pub payload: Payload,
}

impl Envelope {
    /// Wraps a system message.
    pub fn system(seq: u64, timestamp: u64, msg: SystemMessage) -> Self {
        Self {
            seq,
            timestamp,
            payload: Payload::System(msg),
        }
    }

    /// Wraps game data.
    pub fn game(seq: u64, timestamp: u64, data: Vec<u8>) -> Self {
        Self {
            seq,
            timestamp,
            payload: Payload::Game(data),
        }
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_bare_string() {
        let json = serde_json::to_string(&PlayerId::new("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(PlayerId::from("bob").to_string(), "bob");
        assert_eq!(RoomId(3).to_string(), "R-3");
        assert_eq!(Slot(1).to_string(), "#1");
        assert_eq!(GameMode::DEFAULT.to_string(), "mode-0");
    }

    #[test]
    fn test_slot_index() {
        assert_eq!(Slot(2).index(), 2);
    }

    #[test]
    fn test_system_message_is_internally_tagged() {
        let msg = SystemMessage::JoinQueue {
            mode: GameMode(0),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "JoinQueue");
        assert_eq!(value["mode"], 0);
    }

    #[test]
    fn test_room_detail_newtype_variant_carries_fields() {
        let msg = SystemMessage::RoomDetail(RoomDetail {
            room_size: 2,
            players: vec![PlayerInfo {
                slot: Slot(0),
                player_id: PlayerId::new("p1"),
            }],
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "RoomDetail");
        assert_eq!(value["room_size"], 2);
        assert_eq!(value["players"][0]["player_id"], "p1");
    }

    #[test]
    fn test_room_status_none_serializes_null() {
        let msg = SystemMessage::RoomStatus { assignment: None };
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value["assignment"].is_null());
    }

    #[test]
    fn test_game_payload_is_adjacently_tagged() {
        let env = Envelope::game(4, 10, vec![1, 2]);
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["payload"]["type"], "Game");
        assert_eq!(value["payload"]["data"], serde_json::json!([1, 2]));
    }
}
