//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//! Field names are camelCase because the browser client reads them as-is.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cosmetic player skin, assigned randomly at join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skin {
    Knight,
    Wizard,
    Archer,
    Rogue,
}

impl Skin {
    pub const ALL: [Skin; 4] = [Skin::Knight, Skin::Wizard, Skin::Archer, Skin::Rogue];
}

/// Falling object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Hazard, kills an unshielded player
    Block,
    /// Grants the collector a shield window
    Shield,
    /// Freezes every other player
    Freeze,
    /// Slows every other player
    Slow,
}

/// Directional intent, one flag per key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Ask the server for a fresh room code
    CreateRoom,

    /// Subscribe to a room's state broadcasts
    JoinRoom { code: String },

    /// Enter the room as a simulated player
    Join { code: String },

    /// Movement intent
    Input {
        code: String,
        input: DirectionalInput,
    },

    /// Bring a dead player back
    Respawn { code: String },

    /// Leave the room explicitly
    LeaveRoom { code: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Reply to `createRoom`
    RoomCreated { code: String },

    /// Reply to `joinRoom`
    JoinRoomResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Reply to `join`
    JoinResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Arena dimensions and the caller's player id, sent after a successful join
    GameInit {
        width: f64,
        height: f64,
        player_id: Uuid,
    },

    /// Room state at the end of a tick
    GameState {
        players: Vec<PlayerSnapshot>,
        objects: Vec<ObjectSnapshot>,
        game_time: f64,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub alive: bool,
    pub score: f64,
    pub skin: Skin,
    /// Absolute expiry times in simulation milliseconds
    pub shield_until: f64,
    pub freeze_until: f64,
    pub slow_until: f64,
}

/// Falling object state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub vy: f64,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub width: f64,
    pub height: f64,
}
