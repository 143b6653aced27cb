//! Fixed-rate tick driver for every room

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::GameConfig;
use crate::rooms::RoomManager;
use crate::util::time::Timer;

/// Drives all non-empty rooms forward at the configured tick rate
pub struct TickScheduler {
    manager: Arc<RoomManager>,
    tick_duration: Duration,
}

impl TickScheduler {
    pub fn new(manager: Arc<RoomManager>, config: &GameConfig) -> Self {
        Self {
            manager,
            tick_duration: config.tick_duration(),
        }
    }

    /// Advance every room once. Returns how many rooms were simulated.
    pub fn tick_once(&self) -> usize {
        self.manager
            .rooms()
            .iter()
            .filter(|room| room.tick())
            .count()
    }

    /// Run the authoritative tick loop
    pub async fn run(self) {
        info!(
            tick_ms = self.tick_duration.as_millis() as u64,
            "Tick scheduler started"
        );

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            let timer = Timer::new();
            let active = self.tick_once();

            let elapsed = timer.elapsed_micros();
            if elapsed > self.tick_duration.as_micros() as u64 {
                warn!(
                    elapsed_us = elapsed,
                    active_rooms = active,
                    "Tick overran its budget"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomConfig;
    use crate::ws::protocol::ServerMsg;
    use uuid::Uuid;

    #[tokio::test(start_paused = true)]
    async fn only_non_empty_rooms_are_advanced() {
        let config = GameConfig::default();
        let manager = Arc::new(RoomManager::new(config.clone(), RoomConfig::default()));
        let busy = manager.create_room();
        let idle = manager.create_room();
        manager.join_game(&busy, Uuid::new_v4()).unwrap();

        let busy_room = manager.get(&busy).unwrap();
        let idle_room = manager.get(&idle).unwrap();
        let mut busy_rx = busy_room.subscribe();
        let mut idle_rx = idle_room.subscribe();

        let scheduler = TickScheduler::new(manager.clone(), &config);
        assert_eq!(scheduler.tick_once(), 1);
        assert_eq!(scheduler.tick_once(), 1);

        assert!(matches!(busy_rx.try_recv(), Ok(ServerMsg::GameState { .. })));
        assert!(idle_rx.try_recv().is_err());
        assert!((busy_room.with_state(|s| s.game_time) - 0.1).abs() < 1e-12);
        assert_eq!(idle_room.with_state(|s| s.game_time), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_at_configured_rate() {
        let config = GameConfig::default();
        let manager = Arc::new(RoomManager::new(config.clone(), RoomConfig::default()));
        let code = manager.create_room();
        manager.join_game(&code, Uuid::new_v4()).unwrap();
        let room = manager.get(&code).unwrap();

        let handle = tokio::spawn(TickScheduler::new(manager.clone(), &config).run());
        // First tick fires immediately, then every 50ms
        tokio::time::sleep(Duration::from_millis(1_020)).await;
        handle.abort();

        assert_eq!(room.with_state(|s| s.tick), 21);
    }
}
