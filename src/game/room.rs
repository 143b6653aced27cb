//! Room simulation state and the fixed-step advance

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::GameConfig;
use crate::ws::protocol::{DirectionalInput, ObjectKind, Skin};

use super::collision::{CollisionEvent, CollisionSystem};
use super::entity::{ConnectionId, FallingObject, Player};
use super::physics::PhysicsSystem;

/// Score gained per second of survival
pub const SCORE_PER_SECOND: f64 = 10.0;

/// Spawn weights, sampled in order
pub const SPAWN_TABLE: [(ObjectKind, f64); 4] = [
    (ObjectKind::Block, 0.7),
    (ObjectKind::Shield, 0.1),
    (ObjectKind::Freeze, 0.1),
    (ObjectKind::Slow, 0.1),
];

/// Errors from room and player lookups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Player not found: {0}")]
    PlayerNotFound(ConnectionId),
}

/// Pick an object kind from a roll in [0, 1) by cumulative weight.
/// A roll landing exactly on a boundary goes to the later entry.
pub fn pick_kind(roll: f64) -> ObjectKind {
    let mut remaining = roll;
    for (kind, weight) in SPAWN_TABLE {
        if remaining < weight {
            return kind;
        }
        remaining -= weight;
    }
    ObjectKind::Block
}

/// Simulation state of one room (owned behind the room lock)
pub struct RoomState {
    pub code: String,
    config: Arc<GameConfig>,
    pub players: BTreeMap<ConnectionId, Player>,
    pub objects: BTreeMap<Uuid, FallingObject>,
    /// Seconds of simulated time, advanced only by ticks
    pub game_time: f64,
    pub last_spawn_time: f64,
    pub tick: u64,
    rng: ChaCha8Rng,
}

impl RoomState {
    pub fn new(code: String, config: Arc<GameConfig>, seed: u64) -> Self {
        Self {
            code,
            config,
            players: BTreeMap::new(),
            objects: BTreeMap::new(),
            game_time: 0.0,
            last_spawn_time: 0.0,
            tick: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current simulation time in milliseconds
    pub fn now_ms(&self) -> f64 {
        self.game_time * 1000.0
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Advance the simulation by exactly one timestep
    pub fn advance(&mut self) -> Vec<CollisionEvent> {
        let dt = self.config.dt();
        self.tick += 1;
        self.game_time += dt;

        if self.game_time - self.last_spawn_time > self.config.spawn_interval {
            self.spawn_object();
            self.last_spawn_time = self.game_time;
        }

        let config = &self.config;
        self.objects.retain(|_, object| {
            PhysicsSystem::fall(object, config.gravity, dt);
            !PhysicsSystem::has_fallen_out(object, config)
        });

        let now = self.now_ms();
        for player in self.players.values_mut().filter(|p| p.alive) {
            PhysicsSystem::move_player(player, now, config);
        }

        let events = CollisionSystem::resolve(&mut self.players, &mut self.objects, config, now);

        for player in self.players.values_mut().filter(|p| p.alive) {
            player.score += dt * SCORE_PER_SECOND;
        }

        events
    }

    /// Drop a new object above the arena at a random x
    pub fn spawn_object(&mut self) -> Uuid {
        let kind = pick_kind(self.rng.gen::<f64>());
        let x = self
            .rng
            .gen_range(0.0..self.config.arena_width - self.config.object_size);
        let id = uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid();

        self.objects
            .insert(id, FallingObject::new(id, kind, x, &self.config));
        id
    }

    /// Add a player, or return the existing one.
    /// Returns the player and whether it was already present.
    pub fn join_player(&mut self, id: ConnectionId) -> (Player, bool) {
        if let Some(existing) = self.players.get(&id) {
            return (existing.clone(), true);
        }

        let skin = Skin::ALL[self.rng.gen_range(0..Skin::ALL.len())];
        let player = Player::new(id, skin, &self.config);
        self.players.insert(id, player.clone());
        (player, false)
    }

    pub fn remove_player(&mut self, id: ConnectionId) -> Option<Player> {
        self.players.remove(&id)
    }

    /// Set a player's velocity from directional input. Ignored while dead.
    pub fn apply_input(
        &mut self,
        id: ConnectionId,
        input: &DirectionalInput,
    ) -> Result<(), RoomError> {
        let speed = self.config.player_speed;
        let player = self
            .players
            .get_mut(&id)
            .ok_or(RoomError::PlayerNotFound(id))?;

        if player.alive {
            let (vx, vy) = PhysicsSystem::input_velocity(input, speed);
            player.vx = vx;
            player.vy = vy;
        }
        Ok(())
    }

    /// Reset a dead player to join-time defaults.
    /// Returns true if the player was respawned.
    pub fn respawn(&mut self, id: ConnectionId) -> bool {
        match self.players.get_mut(&id) {
            Some(player) if !player.alive => {
                player.reset(&self.config);
                true
            }
            _ => false,
        }
    }
}
