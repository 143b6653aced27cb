//! Player movement and falling object integration

use crate::config::GameConfig;
use crate::ws::protocol::DirectionalInput;

use super::entity::{FallingObject, Player};

/// Speed multiplier while a slow effect is active
pub const SLOW_MULTIPLIER: f64 = 0.3;

/// Diagonal input is scaled so its magnitude stays at one
pub const DIAGONAL_FACTOR: f64 = 0.7071;

/// Physics system for updating positions and velocities
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Turn directional keys into a velocity
    /// Returns (vx, vy)
    pub fn input_velocity(input: &DirectionalInput, speed: f64) -> (f64, f64) {
        let mut dx = 0.0;
        let mut dy = 0.0;

        if input.left {
            dx -= 1.0;
        }
        if input.right {
            dx += 1.0;
        }
        if input.up {
            dy -= 1.0;
        }
        if input.down {
            dy += 1.0;
        }

        if dx != 0.0 && dy != 0.0 {
            dx *= DIAGONAL_FACTOR;
            dy *= DIAGONAL_FACTOR;
        }

        (dx * speed, dy * speed)
    }

    /// Apply gravity to a falling object (semi-implicit Euler, velocity first)
    pub fn fall(object: &mut FallingObject, gravity: f64, dt: f64) {
        object.vy += gravity * dt;
        object.y += object.vy * dt;
    }

    /// Whether an object has dropped far enough below the arena to be removed
    pub fn has_fallen_out(object: &FallingObject, config: &GameConfig) -> bool {
        object.y > config.arena_height + config.despawn_margin
    }

    /// Move a living player for one tick, honoring freeze and slow
    pub fn move_player(player: &mut Player, now_ms: f64, config: &GameConfig) {
        if player.is_frozen(now_ms) {
            player.vx = 0.0;
            player.vy = 0.0;
            return;
        }

        let speed_multiplier = if player.is_slowed(now_ms) {
            SLOW_MULTIPLIER
        } else {
            1.0
        };

        let dt = config.dt();
        let (x, y) = Self::clamp_to_arena(
            player.x + player.vx * dt * speed_multiplier,
            player.y + player.vy * dt * speed_multiplier,
            config,
        );
        player.x = x;
        player.y = y;
    }

    /// Clamp a player position into the arena
    pub fn clamp_to_arena(x: f64, y: f64, config: &GameConfig) -> (f64, f64) {
        (
            x.clamp(0.0, config.max_player_x()),
            y.clamp(0.0, config.max_player_y()),
        )
    }

    /// Axis-aligned bounding box overlap between a player and an object
    pub fn overlaps(player: &Player, player_size: f64, object: &FallingObject) -> bool {
        player.x < object.x + object.width
            && player.x + player_size > object.x
            && player.y < object.y + object.height
            && player.y + player_size > object.y
    }
}
