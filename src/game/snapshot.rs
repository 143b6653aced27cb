//! Snapshot building for network transmission

use crate::ws::protocol::{ObjectSnapshot, PlayerSnapshot, ServerMsg};

use super::room::RoomState;

/// Builds full-state snapshots of a room
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Build a `gameState` message for the room as it is now
    pub fn build(state: &RoomState) -> ServerMsg {
        let players: Vec<PlayerSnapshot> = state.players.values().map(|p| p.snapshot()).collect();
        let objects: Vec<ObjectSnapshot> = state.objects.values().map(|o| o.snapshot()).collect();

        ServerMsg::GameState {
            players,
            objects,
            game_time: state.game_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn snapshot_contains_only_this_room() {
        let config = Arc::new(GameConfig::default());
        let mut a = RoomState::new("AAAAAA".into(), config.clone(), 1);
        let mut b = RoomState::new("BBBBBB".into(), config, 2);
        let id = Uuid::new_v4();
        a.join_player(id);
        a.spawn_object();
        b.join_player(Uuid::new_v4());
        a.advance();

        match SnapshotBuilder::build(&a) {
            ServerMsg::GameState {
                players,
                objects,
                game_time,
            } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id, id);
                assert_eq!(objects.len(), 1);
                assert_eq!(game_time, a.game_time);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
