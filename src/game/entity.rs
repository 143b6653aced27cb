//! Player and falling object state owned by a room

use uuid::Uuid;

use crate::config::GameConfig;
use crate::ws::protocol::{ObjectKind, ObjectSnapshot, PlayerSnapshot, Skin};

/// Connection identifier, doubles as the player id
pub type ConnectionId = Uuid;

/// Player state in a room (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: ConnectionId,

    // Position and movement
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,

    pub alive: bool,
    pub score: f64,
    pub skin: Skin,

    // Timed effects, absolute simulation milliseconds
    pub shield_until: f64,
    pub freeze_until: f64,
    pub slow_until: f64,
}

impl Player {
    pub fn new(id: ConnectionId, skin: Skin, config: &GameConfig) -> Self {
        let (x, y) = spawn_point(config);
        Self {
            id,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            alive: true,
            score: 0.0,
            skin,
            shield_until: 0.0,
            freeze_until: 0.0,
            slow_until: 0.0,
        }
    }

    /// Put the player back to join-time defaults, keeping id and skin
    pub fn reset(&mut self, config: &GameConfig) {
        let (x, y) = spawn_point(config);
        self.x = x;
        self.y = y;
        self.vx = 0.0;
        self.vy = 0.0;
        self.alive = true;
        self.score = 0.0;
        self.shield_until = 0.0;
        self.freeze_until = 0.0;
        self.slow_until = 0.0;
    }

    pub fn is_shielded(&self, now_ms: f64) -> bool {
        now_ms < self.shield_until
    }

    pub fn is_frozen(&self, now_ms: f64) -> bool {
        now_ms < self.freeze_until
    }

    pub fn is_slowed(&self, now_ms: f64) -> bool {
        now_ms < self.slow_until
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            x: self.x,
            y: self.y,
            vx: self.vx,
            vy: self.vy,
            alive: self.alive,
            score: self.score,
            skin: self.skin,
            shield_until: self.shield_until,
            freeze_until: self.freeze_until,
            slow_until: self.slow_until,
        }
    }
}

/// Bottom-center of the arena, a little above the floor
fn spawn_point(config: &GameConfig) -> (f64, f64) {
    (
        config.arena_width / 2.0 - config.player_size / 2.0,
        config.arena_height - config.player_size - 10.0,
    )
}

/// Falling object in the arena
#[derive(Debug, Clone, PartialEq)]
pub struct FallingObject {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub vy: f64,
    pub kind: ObjectKind,
    pub width: f64,
    pub height: f64,
}

impl FallingObject {
    /// Create an object just above the visible arena
    pub fn new(id: Uuid, kind: ObjectKind, x: f64, config: &GameConfig) -> Self {
        Self {
            id,
            x,
            y: -config.object_size,
            vy: 0.0,
            kind,
            width: config.object_size,
            height: config.object_size,
        }
    }

    pub fn snapshot(&self) -> ObjectSnapshot {
        ObjectSnapshot {
            id: self.id,
            x: self.x,
            y: self.y,
            vy: self.vy,
            kind: self.kind,
            width: self.width,
            height: self.height,
        }
    }
}
