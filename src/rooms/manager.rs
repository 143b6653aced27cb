//! Room manager - registry of live rooms and connection membership

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{GameConfig, RoomConfig};
use crate::game::{ConnectionId, RoomError};
use crate::ws::protocol::{DirectionalInput, PlayerSnapshot};

use super::code::{generate_code, normalize_code};
use super::room::{Room, RoomSummary};

/// Result of a successful `join`
pub struct JoinOutcome {
    pub room: Arc<Room>,
    pub player: PlayerSnapshot,
    /// The connection already had a player in this room
    pub already_joined: bool,
}

/// Registry of all rooms, the only place rooms are created or deleted
pub struct RoomManager {
    game: Arc<GameConfig>,
    config: RoomConfig,
    rooms: DashMap<String, Arc<Room>>,
    /// Connection -> code of the room it last joined
    connections: DashMap<ConnectionId, String>,
}

impl RoomManager {
    pub fn new(game: GameConfig, config: RoomConfig) -> Self {
        Self {
            game: Arc::new(game),
            config,
            rooms: DashMap::new(),
            connections: DashMap::new(),
        }
    }

    pub fn game_config(&self) -> &GameConfig {
        &self.game
    }

    fn new_room(&self, code: String) -> Arc<Room> {
        Arc::new(Room::new(code, self.game.clone(), rand::random::<u64>()))
    }

    /// Create a room under a fresh code
    pub fn create_room(self: &Arc<Self>) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code = generate_code(&mut rng);
            if let Entry::Vacant(entry) = self.rooms.entry(code.clone()) {
                let room = self.new_room(code.clone());
                entry.insert(room.clone());
                // Nobody is in it yet, so it starts on the cleanup clock
                self.schedule_cleanup(&room);
                info!(code = %code, "Room created");
                return code;
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<Arc<Room>> {
        let code = normalize_code(code)?;
        self.rooms.get(&code).map(|r| r.value().clone())
    }

    /// Look up a room, creating it when the code is unknown and
    /// auto-creation is enabled
    pub fn resolve_or_create(self: &Arc<Self>, code: &str) -> Result<Arc<Room>, RoomError> {
        let code = normalize_code(code).ok_or_else(|| RoomError::RoomNotFound(code.to_string()))?;

        if let Some(room) = self.rooms.get(&code) {
            return Ok(room.value().clone());
        }
        if !self.config.auto_create {
            return Err(RoomError::RoomNotFound(code));
        }

        let (room, created) = match self.rooms.entry(code.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let room = self.new_room(code.clone());
                entry.insert(room.clone());
                (room, true)
            }
        };

        if created {
            self.schedule_cleanup(&room);
            info!(code = %code, "Room created on join");
        }
        Ok(room)
    }

    /// Attach a connection to a room's broadcast group
    pub fn join_room(
        self: &Arc<Self>,
        code: &str,
        connection_id: ConnectionId,
    ) -> Result<Arc<Room>, RoomError> {
        let room = self.resolve_or_create(code)?;
        self.leave_previous_room(connection_id, &room.code);
        room.touch();
        self.connections.insert(connection_id, room.code.clone());

        debug!(code = %room.code, connection_id = %connection_id, "Connection joined room");
        Ok(room)
    }

    /// Enter a connection as a player. Joining twice is a no-op success.
    pub fn join_game(
        self: &Arc<Self>,
        code: &str,
        connection_id: ConnectionId,
    ) -> Result<JoinOutcome, RoomError> {
        let code = normalize_code(code).ok_or_else(|| RoomError::RoomNotFound(code.to_string()))?;

        // The entry guard is held while the player is added, so a cleanup
        // task firing concurrently sees either no player and an earlier
        // removal, or the player and no removal.
        let (room, player, already_joined, created) = {
            let (entry, created) = match self.rooms.entry(code.clone()) {
                Entry::Occupied(entry) => (entry.into_ref(), false),
                Entry::Vacant(entry) => {
                    if !self.config.auto_create {
                        return Err(RoomError::RoomNotFound(code));
                    }
                    (entry.insert(self.new_room(code.clone())), true)
                }
            };
            let room = entry.value().clone();
            room.cancel_cleanup();
            let (player, already_joined) = room.with_state(|s| s.join_player(connection_id));
            room.touch();
            (room, player, already_joined, created)
        };

        // Only once the target room is known good, and outside the entry guard
        self.leave_previous_room(connection_id, &code);
        self.connections.insert(connection_id, code.clone());

        if created {
            info!(code = %code, "Room created on join");
        }
        if already_joined {
            debug!(code = %code, connection_id = %connection_id, "Player already in room");
        } else {
            info!(
                code = %code,
                connection_id = %connection_id,
                player_count = room.player_count(),
                "Player joined room"
            );
        }

        Ok(JoinOutcome {
            room,
            player: player.snapshot(),
            already_joined,
        })
    }

    /// Update a player's movement intent
    pub fn apply_input(
        &self,
        code: &str,
        connection_id: ConnectionId,
        input: &DirectionalInput,
    ) -> Result<(), RoomError> {
        let room = self
            .get(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.to_string()))?;
        room.touch();
        room.with_state(|s| s.apply_input(connection_id, input))
    }

    /// Bring a dead player back. Returns whether anything changed.
    pub fn respawn(&self, connection_id: ConnectionId) -> bool {
        let Some(room) = self
            .connections
            .get(&connection_id)
            .and_then(|code| self.rooms.get(code.value()).map(|r| r.value().clone()))
        else {
            return false;
        };

        room.touch();
        let respawned = room.with_state(|s| s.respawn(connection_id));
        if respawned {
            debug!(code = %room.code, connection_id = %connection_id, "Player respawned");
        }
        respawned
    }

    /// Explicit leave from a room
    pub fn leave(self: &Arc<Self>, code: &str, connection_id: ConnectionId) -> bool {
        let Some(code) = normalize_code(code) else {
            return false;
        };
        self.connections
            .remove_if(&connection_id, |_, current| current == &code);
        self.remove_player(&code, connection_id)
    }

    /// Transport-level disconnect, same cleanup path as leave
    pub fn on_disconnect(self: &Arc<Self>, connection_id: ConnectionId) -> bool {
        match self.connections.remove(&connection_id) {
            Some((_, code)) => self.remove_player(&code, connection_id),
            None => false,
        }
    }

    fn leave_previous_room(self: &Arc<Self>, connection_id: ConnectionId, next_code: &str) {
        let previous = self
            .connections
            .get(&connection_id)
            .map(|c| c.value().clone())
            .filter(|c| c != next_code);

        if let Some(previous) = previous {
            self.connections
                .remove_if(&connection_id, |_, current| current == &previous);
            self.remove_player(&previous, connection_id);
        }
    }

    /// Remove a player and start the cleanup clock if the room emptied
    fn remove_player(self: &Arc<Self>, code: &str, connection_id: ConnectionId) -> bool {
        let Some(room) = self.rooms.get(code).map(|r| r.value().clone()) else {
            return false;
        };

        let (removed, now_empty) = room.with_state(|s| {
            let removed = s.remove_player(connection_id).is_some();
            (removed, s.is_empty())
        });
        room.touch();

        if removed {
            info!(code = %code, connection_id = %connection_id, "Player left room");
            if now_empty {
                self.schedule_cleanup(&room);
            }
        }
        removed
    }

    /// Arm the delayed delete for an empty room, replacing any earlier one
    fn schedule_cleanup(self: &Arc<Self>, room: &Arc<Room>) {
        let manager = Arc::downgrade(self);
        let target = Arc::downgrade(room);
        let delay = self.config.cleanup_delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let (Some(manager), Some(room)) = (manager.upgrade(), target.upgrade()) {
                manager.remove_if_abandoned(&room);
            }
        });

        room.set_cleanup(handle);
        debug!(code = %room.code, delay_ms = delay.as_millis() as u64, "Room cleanup scheduled");
    }

    /// Delete a room if it is still registered under its code and still empty
    fn remove_if_abandoned(&self, room: &Arc<Room>) -> bool {
        let removed = self
            .rooms
            .remove_if(&room.code, |_, current| {
                Arc::ptr_eq(current, room) && current.player_count() == 0
            })
            .is_some();

        if removed {
            info!(code = %room.code, "Empty room deleted");
        }
        removed
    }

    /// Delete rooms with no activity for longer than the idle timeout.
    /// Returns the number of rooms removed.
    pub fn sweep_idle(&self) -> usize {
        let idle_timeout = self.config.idle_timeout;
        let mut swept = 0;

        self.rooms.retain(|code, room| {
            if room.idle_for() < idle_timeout {
                return true;
            }
            room.cancel_cleanup();
            info!(code = %code, player_count = room.player_count(), "Idle room swept");
            swept += 1;
            false
        });

        swept
    }

    /// Run the idle sweep forever
    pub async fn run_idle_sweep(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let swept = self.sweep_idle();
            if swept > 0 {
                info!(swept, remaining = self.rooms.len(), "Idle sweep finished");
            }
        }
    }

    /// Handles to every room, for the tick scheduler
    pub fn rooms(&self) -> Vec<Arc<Room>> {
        self.rooms.iter().map(|r| r.value().clone()).collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn player_count(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    /// Code of the room a connection belongs to
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<String> {
        self.connections.get(&connection_id).map(|c| c.value().clone())
    }

    pub fn summary(&self, code: &str) -> Option<RoomSummary> {
        self.get(code).map(|room| room.summary())
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self.rooms().iter().map(|r| r.summary()).collect();
        summaries.sort_by(|a, b| a.code.cmp(&b.code));
        summaries
    }
}
