//! Collision resolution - hazards and power-up effects

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::config::GameConfig;
use crate::ws::protocol::ObjectKind;

use super::entity::{ConnectionId, FallingObject, Player};
use super::physics::PhysicsSystem;

/// How long a shield protects its collector
pub const SHIELD_DURATION_MS: f64 = 5000.0;
/// How long other players stay frozen after a freeze pickup
pub const FREEZE_DURATION_MS: f64 = 3000.0;
/// How long other players stay slowed after a slow pickup
pub const SLOW_DURATION_MS: f64 = 4000.0;

/// Outcome of a single player touching a single object
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Unshielded player hit by a block
    Killed,
    /// Block absorbed by an active shield
    Absorbed,
    /// Collector's shield window set
    Shielded { until: f64 },
    /// Everyone except the collector frozen
    FreezeOthers { until: f64 },
    /// Everyone except the collector slowed
    SlowOthers { until: f64 },
}

/// Collision recorded during a tick
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    pub player_id: ConnectionId,
    pub object_id: Uuid,
    pub effect: Effect,
}

/// Collision system for hazards and pickups
pub struct CollisionSystem;

impl CollisionSystem {
    /// Decide what touching an object does to a player at `now_ms`
    pub fn decide(kind: ObjectKind, collector: &Player, now_ms: f64) -> Effect {
        match kind {
            ObjectKind::Block => {
                if collector.is_shielded(now_ms) {
                    Effect::Absorbed
                } else {
                    Effect::Killed
                }
            }
            ObjectKind::Shield => Effect::Shielded {
                until: now_ms + SHIELD_DURATION_MS,
            },
            ObjectKind::Freeze => Effect::FreezeOthers {
                until: now_ms + FREEZE_DURATION_MS,
            },
            ObjectKind::Slow => Effect::SlowOthers {
                until: now_ms + SLOW_DURATION_MS,
            },
        }
    }

    /// Apply an effect on behalf of `collector_id`. Dead players are never touched.
    pub fn apply(
        players: &mut BTreeMap<ConnectionId, Player>,
        collector_id: ConnectionId,
        effect: Effect,
    ) {
        match effect {
            Effect::Killed => {
                if let Some(player) = players.get_mut(&collector_id) {
                    player.alive = false;
                }
            }
            Effect::Absorbed => {}
            Effect::Shielded { until } => {
                if let Some(player) = players.get_mut(&collector_id) {
                    player.shield_until = until;
                }
            }
            Effect::FreezeOthers { until } => {
                for player in players.values_mut() {
                    if player.alive && player.id != collector_id {
                        player.freeze_until = until;
                    }
                }
            }
            Effect::SlowOthers { until } => {
                for player in players.values_mut() {
                    if player.alive && player.id != collector_id {
                        player.slow_until = until;
                    }
                }
            }
        }
    }

    /// Resolve every living player against every object for one tick.
    ///
    /// Each object is taken out of the active set before it is evaluated,
    /// so it is processed once even when several players overlap it. Every
    /// player overlapping it at that moment triggers the effect; an object
    /// nobody touches goes back in.
    pub fn resolve(
        players: &mut BTreeMap<ConnectionId, Player>,
        objects: &mut BTreeMap<Uuid, FallingObject>,
        config: &GameConfig,
        now_ms: f64,
    ) -> Vec<CollisionEvent> {
        let mut events = Vec::new();
        let object_ids: Vec<Uuid> = objects.keys().copied().collect();

        for object_id in object_ids {
            let Some(object) = objects.remove(&object_id) else {
                continue;
            };

            let touching: Vec<ConnectionId> = players
                .values()
                .filter(|p| p.alive && PhysicsSystem::overlaps(p, config.player_size, &object))
                .map(|p| p.id)
                .collect();

            if touching.is_empty() {
                objects.insert(object_id, object);
                continue;
            }

            for player_id in touching {
                let Some(player) = players.get(&player_id) else {
                    continue;
                };
                let effect = Self::decide(object.kind, player, now_ms);
                Self::apply(players, player_id, effect);
                events.push(CollisionEvent {
                    player_id,
                    object_id,
                    effect,
                });
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::Skin;

    fn setup(count: usize) -> (GameConfig, BTreeMap<ConnectionId, Player>, Vec<ConnectionId>) {
        let config = GameConfig::default();
        let mut players = BTreeMap::new();
        let mut ids = Vec::new();
        for _ in 0..count {
            let player = Player::new(Uuid::new_v4(), Skin::Knight, &config);
            ids.push(player.id);
            players.insert(player.id, player);
        }
        (config, players, ids)
    }

    fn object_on(player: &Player, kind: ObjectKind, config: &GameConfig) -> FallingObject {
        let mut object = FallingObject::new(Uuid::new_v4(), kind, player.x, config);
        object.y = player.y;
        object
    }

    fn single(object: FallingObject) -> BTreeMap<Uuid, FallingObject> {
        let mut objects = BTreeMap::new();
        objects.insert(object.id, object);
        objects
    }

    #[test]
    fn block_kills_unshielded_player() {
        let (config, mut players, ids) = setup(1);
        let mut objects = single(object_on(&players[&ids[0]], ObjectKind::Block, &config));

        let events = CollisionSystem::resolve(&mut players, &mut objects, &config, 1000.0);

        assert!(!players[&ids[0]].alive);
        assert!(objects.is_empty());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].effect, Effect::Killed);
    }

    #[test]
    fn shield_negates_block_and_block_is_still_removed() {
        let (config, mut players, ids) = setup(1);
        players.get_mut(&ids[0]).unwrap().shield_until = 2000.0;
        let mut objects = single(object_on(&players[&ids[0]], ObjectKind::Block, &config));

        let events = CollisionSystem::resolve(&mut players, &mut objects, &config, 1999.0);

        assert!(players[&ids[0]].alive);
        assert!(objects.is_empty());
        assert_eq!(events[0].effect, Effect::Absorbed);
    }

    #[test]
    fn shield_pickup_overwrites_window() {
        let (config, mut players, ids) = setup(1);
        players.get_mut(&ids[0]).unwrap().shield_until = 99_000.0;
        let mut objects = single(object_on(&players[&ids[0]], ObjectKind::Shield, &config));

        CollisionSystem::resolve(&mut players, &mut objects, &config, 1000.0);

        assert_eq!(players[&ids[0]].shield_until, 6000.0);
        assert!(objects.is_empty());
    }

    #[test]
    fn freeze_affects_everyone_but_collector() {
        let (config, mut players, ids) = setup(3);
        // Move the others out of the way
        players.get_mut(&ids[1]).unwrap().x = 0.0;
        players.get_mut(&ids[2]).unwrap().x = 700.0;
        let mut objects = single(object_on(&players[&ids[0]], ObjectKind::Freeze, &config));

        CollisionSystem::resolve(&mut players, &mut objects, &config, 500.0);

        assert_eq!(players[&ids[0]].freeze_until, 0.0);
        assert_eq!(players[&ids[1]].freeze_until, 3500.0);
        assert_eq!(players[&ids[2]].freeze_until, 3500.0);
    }

    #[test]
    fn slow_affects_everyone_but_collector() {
        let (config, mut players, ids) = setup(2);
        players.get_mut(&ids[1]).unwrap().x = 0.0;
        let mut objects = single(object_on(&players[&ids[0]], ObjectKind::Slow, &config));

        CollisionSystem::resolve(&mut players, &mut objects, &config, 0.0);

        assert_eq!(players[&ids[0]].slow_until, 0.0);
        assert_eq!(players[&ids[1]].slow_until, 4000.0);
    }

    #[test]
    fn dead_players_neither_trigger_nor_receive() {
        let (config, mut players, ids) = setup(2);
        players.get_mut(&ids[0]).unwrap().alive = false;
        players.get_mut(&ids[1]).unwrap().x = 0.0;
        let mut objects = single(object_on(&players[&ids[0]], ObjectKind::Freeze, &config));

        let events = CollisionSystem::resolve(&mut players, &mut objects, &config, 0.0);

        assert!(events.is_empty());
        assert_eq!(objects.len(), 1);
        assert_eq!(players[&ids[1]].freeze_until, 0.0);

        // A dead bystander is not frozen either
        let (config, mut players, ids) = setup(2);
        players.get_mut(&ids[1]).unwrap().alive = false;
        let mut objects = single(object_on(&players[&ids[0]], ObjectKind::Freeze, &config));
        players.get_mut(&ids[1]).unwrap().x = 0.0;

        CollisionSystem::resolve(&mut players, &mut objects, &config, 0.0);

        assert_eq!(players[&ids[1]].freeze_until, 0.0);
    }

    #[test]
    fn shared_object_triggers_for_each_player_and_is_removed_once() {
        let (config, mut players, ids) = setup(2);
        let mut objects = single(object_on(&players[&ids[0]], ObjectKind::Block, &config));

        let events = CollisionSystem::resolve(&mut players, &mut objects, &config, 0.0);

        assert_eq!(events.len(), 2);
        assert!(objects.is_empty());
        assert!(ids.iter().all(|id| !players[id].alive));
    }

    #[test]
    fn shared_power_up_collectors_affect_each_other() {
        for (kind, until) in [(ObjectKind::Freeze, 3500.0), (ObjectKind::Slow, 4500.0)] {
            let (config, mut players, ids) = setup(3);
            // ids[0] and ids[1] share the spawn point, ids[2] stands aside
            players.get_mut(&ids[2]).unwrap().x = 0.0;
            let mut objects = single(object_on(&players[&ids[0]], kind, &config));

            let events = CollisionSystem::resolve(&mut players, &mut objects, &config, 500.0);

            assert_eq!(events.len(), 2);
            assert!(objects.is_empty());
            for id in &ids {
                let player = &players[id];
                let value = match kind {
                    ObjectKind::Freeze => player.freeze_until,
                    _ => player.slow_until,
                };
                assert_eq!(value, until, "{:?} on {}", kind, id);
            }
        }
    }

    #[test]
    fn objects_resolve_in_id_order() {
        let (config, mut players, ids) = setup(1);
        let target = players[&ids[0]].clone();

        let mut shield = object_on(&target, ObjectKind::Shield, &config);
        shield.id = Uuid::from_u128(1);
        let mut block = object_on(&target, ObjectKind::Block, &config);
        block.id = Uuid::from_u128(2);
        let mut objects = BTreeMap::new();
        objects.insert(block.id, block);
        objects.insert(shield.id, shield);

        let events = CollisionSystem::resolve(&mut players, &mut objects, &config, 0.0);

        assert!(players[&ids[0]].alive);
        assert_eq!(events[0].effect, Effect::Shielded { until: 5000.0 });
        assert_eq!(events[1].effect, Effect::Absorbed);

        // Reversed ids: the block lands before the shield is picked up
        let (config, mut players, ids) = setup(1);
        let target = players[&ids[0]].clone();
        let mut block = object_on(&target, ObjectKind::Block, &config);
        block.id = Uuid::from_u128(1);
        let mut shield = object_on(&target, ObjectKind::Shield, &config);
        shield.id = Uuid::from_u128(2);
        let mut objects = BTreeMap::new();
        objects.insert(shield.id, shield);
        objects.insert(block.id, block);

        let events = CollisionSystem::resolve(&mut players, &mut objects, &config, 0.0);

        assert!(!players[&ids[0]].alive);
        assert_eq!(events.len(), 1);
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn untouched_objects_stay_active() {
        let (config, mut players, _) = setup(1);
        let object = FallingObject::new(Uuid::new_v4(), ObjectKind::Block, 0.0, &config);
        let mut objects = single(object);

        let events = CollisionSystem::resolve(&mut players, &mut objects, &config, 0.0);

        assert!(events.is_empty());
        assert_eq!(objects.len(), 1);
    }
}
