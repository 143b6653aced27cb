//! Shared handle to a live room

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::game::collision::Effect;
use crate::game::{RoomState, SnapshotBuilder};
use crate::ws::protocol::ServerMsg;

/// Snapshots buffered per room before slow subscribers start lagging
const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// A room registered with the manager.
///
/// The state mutex is the room's single-writer domain: ticks and inbound
/// events both go through it, so a room is never advanced twice at once.
pub struct Room {
    pub code: String,
    state: Mutex<RoomState>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    created_at: DateTime<Utc>,
    last_activity: Mutex<Instant>,
    /// Pending delete, owned here but scheduled and cancelled only by the manager
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl Room {
    pub fn new(code: String, config: Arc<GameConfig>, seed: u64) -> Self {
        let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(RoomState::new(code.clone(), config, seed)),
            code,
            snapshot_tx,
            created_at: Utc::now(),
            last_activity: Mutex::new(Instant::now()),
            cleanup: Mutex::new(None),
        }
    }

    /// Run `f` with exclusive access to the simulation state
    pub fn with_state<R>(&self, f: impl FnOnce(&mut RoomState) -> R) -> R {
        f(&mut *self.state.lock())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }

    pub fn player_count(&self) -> usize {
        self.state.lock().player_count()
    }

    /// Record client activity for idle tracking
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Advance one tick and broadcast the result.
    /// Empty rooms are left untouched. Returns whether the room was advanced.
    pub fn tick(&self) -> bool {
        let snapshot = {
            let mut state = self.state.lock();
            if state.is_empty() {
                return false;
            }

            for event in state.advance() {
                match event.effect {
                    Effect::Killed => {
                        info!(code = %self.code, player_id = %event.player_id, "Player killed");
                    }
                    effect => {
                        debug!(
                            code = %self.code,
                            player_id = %event.player_id,
                            object_id = %event.object_id,
                            ?effect,
                            "Collision"
                        );
                    }
                }
            }

            SnapshotBuilder::build(&state)
        };

        // No subscribers is fine, the room may only have headless players
        let _ = self.snapshot_tx.send(snapshot);
        true
    }

    pub(super) fn set_cleanup(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.cleanup.lock().replace(handle) {
            previous.abort();
        }
    }

    pub(super) fn cancel_cleanup(&self) -> bool {
        match self.cleanup.lock().take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn has_pending_cleanup(&self) -> bool {
        self.cleanup
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn summary(&self) -> RoomSummary {
        let (player_count, alive_count, object_count, game_time) = self.with_state(|s| {
            (
                s.player_count(),
                s.players.values().filter(|p| p.alive).count(),
                s.objects.len(),
                s.game_time,
            )
        });

        RoomSummary {
            code: self.code.clone(),
            player_count,
            alive_count,
            object_count,
            game_time,
            created_at: self.created_at,
            idle_secs: self.idle_for().as_secs(),
            pending_cleanup: self.has_pending_cleanup(),
        }
    }
}

/// Room overview for the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub code: String,
    pub player_count: usize,
    pub alive_count: usize,
    pub object_count: usize,
    pub game_time: f64,
    pub created_at: DateTime<Utc>,
    pub idle_secs: u64,
    /// Empty and scheduled for deletion
    pub pending_cleanup: bool,
}
