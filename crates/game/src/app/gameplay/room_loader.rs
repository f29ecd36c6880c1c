//! Builds and tears down everything that belongs to the active room and
//! drives the fade-gated transition between rooms.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::bullets::BulletPool;
use super::enemy::{Enemy, EnemyDamage, EnemyFactory, EnemyPhase, EnemyRequest};
use super::physics::{
    Aabb, ColliderHandle, PhysicsWorld, Relationship, RelationshipKind, SolidLayer,
};
use super::player::Player;
use super::progress::ProgressStore;
use super::rooms::{tile_to_pixel, ItemSpawn, RoomCatalog, TilePos, TILE_SIZE};
use super::tuning::Tuning;

pub(crate) const ITEM_PICKUP_SIZE: f32 = 12.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum RoomLoadError {
    #[error("room not found: {room}")]
    RoomNotFound { room: String },
    #[error("room '{room}' has no spawn points")]
    InvalidSpawnTable { room: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DoorZone {
    pub(crate) id: String,
    pub(crate) area: Aabb,
    pub(crate) target_room: String,
    pub(crate) target_spawn: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ItemPickup {
    pub(crate) spawn: ItemSpawn,
    pub(crate) area: Aabb,
}

/// Everything owned by the loaded room. Replaced wholesale by each load.
#[derive(Debug)]
pub(crate) struct RoomContext {
    pub(crate) room_id: String,
    pub(crate) name: String,
    pub(crate) spawn_id: String,
    pub(crate) pixel_width: f32,
    pub(crate) pixel_height: f32,
    pub(crate) solids: SolidLayer,
    pub(crate) enemies: Vec<Enemy>,
    pub(crate) doors: Vec<DoorZone>,
    pub(crate) items: Vec<ItemPickup>,
    pub(crate) colliders: BTreeMap<Relationship, ColliderHandle>,
    /// Door whose target failed to load. Ignored until the player steps off it.
    blocked_door: Option<String>,
}

/// Long-lived actors the loader repositions or mutates but never owns.
pub(crate) struct Actors<'a> {
    pub(crate) player: &'a mut Player,
    pub(crate) bullets: &'a mut BulletPool,
    pub(crate) progress: &'a mut ProgressStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransitionRequest {
    Started,
    Dropped,
}

#[derive(Debug, Clone, PartialEq)]
enum TransitionState {
    Idle,
    FadingOut {
        started_at: f64,
        target_room: String,
        target_spawn: String,
    },
    FadingIn {
        started_at: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransitionProgress {
    None,
    Loaded { room_id: String },
    LoadFailed(RoomLoadError),
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BulletStop {
    Enemy,
    Tile,
}

/// What happened during one physics step, for the frame driver to act on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RigEvent {
    PlayerTouchedEnemy {
        enemy: u64,
        damage: u32,
        enemy_x: f32,
    },
    BulletStopped {
        bullet: u64,
        by: BulletStop,
    },
    EnemyHurt {
        enemy: u64,
        hp: u32,
    },
    EnemyKilled {
        enemy: u64,
    },
    DoorEntered {
        door: String,
        target_room: String,
    },
    ItemCollected {
        item: String,
    },
}

pub(crate) struct RoomLoader {
    catalog: Arc<RoomCatalog>,
    physics: PhysicsWorld,
    factory: Box<dyn EnemyFactory>,
    tuning: Tuning,
    context: Option<RoomContext>,
    transition: TransitionState,
    pending_door: Option<String>,
}

impl RoomLoader {
    pub(crate) fn new(
        catalog: Arc<RoomCatalog>,
        tuning: &Tuning,
        factory: Box<dyn EnemyFactory>,
    ) -> Self {
        Self {
            catalog,
            physics: PhysicsWorld::new(tuning.gravity, tuning.max_fall_speed),
            factory,
            tuning: tuning.clone(),
            context: None,
            transition: TransitionState::Idle,
            pending_door: None,
        }
    }

    pub(crate) fn catalog(&self) -> &RoomCatalog {
        &self.catalog
    }

    pub(crate) fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub(crate) fn current(&self) -> Option<&RoomContext> {
        self.context.as_ref()
    }

    pub(crate) fn current_room_id(&self) -> Option<&str> {
        self.context.as_ref().map(|context| context.room_id.as_str())
    }

    /// Replaces the active room. The target room and spawn are resolved
    /// before anything is torn down, so a failed load leaves the current room
    /// untouched.
    pub(crate) fn load_room(
        &mut self,
        room_id: &str,
        spawn_id: &str,
        actors: &mut Actors<'_>,
    ) -> Result<(), RoomLoadError> {
        let catalog = Arc::clone(&self.catalog);
        let room = catalog
            .get(room_id)
            .ok_or_else(|| RoomLoadError::RoomNotFound {
                room: room_id.to_string(),
            })?;
        let (resolved_spawn, spawn_tile) =
            room.resolve_spawn(spawn_id)
                .ok_or_else(|| RoomLoadError::InvalidSpawnTable {
                    room: room.id.clone(),
                })?;
        if resolved_spawn != spawn_id {
            debug!(
                room = %room.id,
                requested = spawn_id,
                resolved = resolved_spawn,
                "spawn_fallback"
            );
        }

        self.teardown(actors.bullets);

        let solids = SolidLayer::from_grid(&room.grid);
        let (pixel_width, pixel_height) = room.pixel_size();
        self.physics.set_bounds(pixel_width, pixel_height);

        let (spawn_x, spawn_y) = tile_to_pixel(spawn_tile);
        actors.player.body.place_at(spawn_x, spawn_y);

        let mut enemies = Vec::with_capacity(room.enemies.len());
        for spawn in &room.enemies {
            let (x, y) = tile_to_pixel(spawn.tile);
            let (patrol_min_x, _) = tile_to_pixel(TilePos::new(spawn.patrol_min_x, spawn.tile.y));
            let (patrol_max_x, _) = tile_to_pixel(TilePos::new(spawn.patrol_max_x, spawn.tile.y));
            enemies.push(self.factory.create_enemy(&EnemyRequest {
                spawn_id: &spawn.id,
                archetype: &spawn.archetype,
                x,
                y,
                patrol_min_x,
                patrol_max_x,
            }));
        }

        let doors = room
            .doors
            .iter()
            .map(|door| DoorZone {
                id: door.id.clone(),
                area: Aabb {
                    left: door.tile.x as f32 * TILE_SIZE,
                    top: door.tile.y as f32 * TILE_SIZE,
                    right: (door.tile.x + door.tile_width) as f32 * TILE_SIZE,
                    bottom: (door.tile.y + door.tile_height) as f32 * TILE_SIZE,
                },
                target_room: door.target_room.clone(),
                target_spawn: door.target_spawn.clone(),
            })
            .collect::<Vec<_>>();

        let items = room
            .items
            .iter()
            .filter(|item| !actors.progress.is_item_collected(&item.id))
            .map(|item| {
                let (x, y) = tile_to_pixel(item.tile);
                ItemPickup {
                    spawn: item.clone(),
                    area: Aabb::from_center(x, y, ITEM_PICKUP_SIZE, ITEM_PICKUP_SIZE),
                }
            })
            .collect::<Vec<_>>();

        let colliders = Relationship::ALL
            .iter()
            .map(|relationship| (*relationship, self.physics.colliders.register(*relationship)))
            .collect::<BTreeMap<_, _>>();

        info!(
            room = %room.id,
            spawn = resolved_spawn,
            solids = solids.solid_count(),
            enemies = enemies.len(),
            doors = doors.len(),
            items = items.len(),
            colliders = self.physics.colliders.live_count(),
            first_visit = !actors.progress.is_room_visited(&room.id),
            "room_loaded"
        );

        self.context = Some(RoomContext {
            room_id: room.id.clone(),
            name: room.name.clone(),
            spawn_id: resolved_spawn.to_string(),
            pixel_width,
            pixel_height,
            solids,
            enemies,
            doors,
            items,
            colliders,
            blocked_door: None,
        });

        actors.progress.mark_room_visited(&room.id);
        Ok(())
    }

    /// Disposes every collider of the outgoing room and drops its context.
    /// Handles that are already gone are skipped.
    fn teardown(&mut self, bullets: &mut BulletPool) {
        bullets.clear();
        let Some(context) = self.context.take() else {
            return;
        };

        for (relationship, handle) in context.colliders {
            if !self.physics.colliders.dispose(handle) {
                debug!(
                    room = %context.room_id,
                    relationship = relationship.name(),
                    "collider_already_disposed"
                );
            }
        }
        debug!(room = %context.room_id, "room_torn_down");
    }

    pub(crate) fn is_transition_locked(&self) -> bool {
        !matches!(self.transition, TransitionState::Idle)
    }

    /// Starts a fade-out towards the target. Dropped while another transition
    /// holds the lock.
    pub(crate) fn transition_to_room(
        &mut self,
        target_room: &str,
        target_spawn: &str,
        now: f64,
    ) -> TransitionRequest {
        if self.is_transition_locked() {
            debug!(target = target_room, "transition_dropped");
            return TransitionRequest::Dropped;
        }
        self.transition = TransitionState::FadingOut {
            started_at: now,
            target_room: target_room.to_string(),
            target_spawn: target_spawn.to_string(),
        };
        info!(target = target_room, spawn = target_spawn, "transition_started");
        TransitionRequest::Started
    }

    /// Moves the transition along. The room is rebuilt once the fade-out has
    /// fully covered the screen; the lock is released when the fade-in ends.
    pub(crate) fn advance_transition(
        &mut self,
        now: f64,
        actors: &mut Actors<'_>,
    ) -> TransitionProgress {
        match &self.transition {
            TransitionState::Idle => TransitionProgress::None,
            TransitionState::FadingOut {
                started_at,
                target_room,
                target_spawn,
            } => {
                if now - started_at < self.tuning.fade_out_ms {
                    return TransitionProgress::None;
                }
                let (target_room, target_spawn) = (target_room.clone(), target_spawn.clone());
                let door = self.pending_door.take();
                let result = self.load_room(&target_room, &target_spawn, actors);
                self.transition = TransitionState::FadingIn { started_at: now };
                match result {
                    Ok(()) => TransitionProgress::Loaded {
                        room_id: target_room,
                    },
                    Err(error) => {
                        warn!(target = %target_room, door = ?door, error = %error, "transition_load_failed");
                        if let Some(context) = self.context.as_mut() {
                            context.blocked_door = door;
                        }
                        TransitionProgress::LoadFailed(error)
                    }
                }
            }
            TransitionState::FadingIn { started_at } => {
                if now - started_at < self.tuning.fade_in_ms {
                    return TransitionProgress::None;
                }
                self.transition = TransitionState::Idle;
                debug!("transition_completed");
                TransitionProgress::Completed
            }
        }
    }

    /// 0 is fully visible, 1 fully black.
    pub(crate) fn fade_level(&self, now: f64) -> f32 {
        match &self.transition {
            TransitionState::Idle => 0.0,
            TransitionState::FadingOut { started_at, .. } => {
                fade_fraction(now - started_at, self.tuning.fade_out_ms)
            }
            TransitionState::FadingIn { started_at } => {
                1.0 - fade_fraction(now - started_at, self.tuning.fade_in_ms)
            }
        }
    }

    /// One physics step for the loaded room: patrol, integration, then the
    /// overlap relationships in a fixed order. Relationships whose collider
    /// is not live are skipped.
    pub(crate) fn step(&mut self, dt: f32, now: f64, actors: &mut Actors<'_>) -> Vec<RigEvent> {
        let Self {
            physics,
            tuning,
            context,
            ..
        } = self;
        let Some(context) = context.as_mut() else {
            return Vec::new();
        };
        let live = |relationship: Relationship| {
            context
                .colliders
                .get(&relationship)
                .is_some_and(|handle| physics.colliders.is_live(*handle))
        };
        // Only collide relationships get a solid response during integration.
        let collides = |relationship: Relationship| {
            relationship.kind() == RelationshipKind::Collide && live(relationship)
        };
        let player_solids = collides(Relationship::PlayerSolids);
        let enemy_solids = collides(Relationship::EnemySolids);
        let player_enemies = live(Relationship::PlayerEnemies);
        let bullet_enemies = live(Relationship::BulletEnemies);
        let bullet_solids = live(Relationship::BulletSolids);
        let player_doors = live(Relationship::PlayerDoors);
        let player_items = live(Relationship::PlayerItems);

        let mut events = Vec::new();

        for enemy in &mut context.enemies {
            enemy.patrol(&context.solids);
        }

        physics.integrate(
            &mut actors.player.body,
            dt,
            player_solids.then_some(&context.solids),
        );
        for enemy in context.enemies.iter_mut().filter(|enemy| enemy.is_active()) {
            physics.integrate(&mut enemy.body, dt, enemy_solids.then_some(&context.solids));
            enemy.clamp_to_patrol();
        }
        actors.bullets.advance(dt);

        let player_box = actors.player.body.aabb();

        if player_enemies {
            for enemy in context.enemies.iter_mut().filter(|enemy| enemy.is_active()) {
                if !player_box.intersects(&enemy.body.aabb()) {
                    continue;
                }
                events.push(RigEvent::PlayerTouchedEnemy {
                    enemy: enemy.runtime_id,
                    damage: enemy.damage_to_player,
                    enemy_x: enemy.body.x,
                });
                if tuning.enemy_contact_from_player {
                    let dir = if enemy.body.x < actors.player.body.x { -1.0 } else { 1.0 };
                    let outcome =
                        enemy.take_damage(tuning.enemy_contact_damage_from_player, dir, now, tuning);
                    push_enemy_damage(&mut events, enemy.runtime_id, outcome);
                }
            }
        }

        if bullet_enemies {
            let shots: Vec<(u64, Aabb, f32)> = actors
                .bullets
                .active()
                .map(|bullet| (bullet.id, bullet.aabb(), bullet.direction()))
                .collect();
            for (bullet_id, bullet_box, direction) in shots {
                let Some(enemy) = context
                    .enemies
                    .iter_mut()
                    .find(|enemy| enemy.is_active() && enemy.body.aabb().intersects(&bullet_box))
                else {
                    continue;
                };
                if !actors.bullets.deactivate(bullet_id) {
                    continue;
                }
                events.push(RigEvent::BulletStopped {
                    bullet: bullet_id,
                    by: BulletStop::Enemy,
                });
                let outcome = enemy.take_damage(tuning.bullet_damage, direction, now, tuning);
                push_enemy_damage(&mut events, enemy.runtime_id, outcome);
            }
        }

        if bullet_solids {
            let stuck: Vec<u64> = actors
                .bullets
                .active()
                .filter(|bullet| bullet.age(now) > tuning.bullet_tile_grace_ms)
                .filter(|bullet| context.solids.overlaps_any(&bullet.aabb()))
                .map(|bullet| bullet.id)
                .collect();
            for bullet_id in stuck {
                if actors.bullets.deactivate(bullet_id) {
                    events.push(RigEvent::BulletStopped {
                        bullet: bullet_id,
                        by: BulletStop::Tile,
                    });
                }
            }
        }

        let still_blocked = context.blocked_door.as_deref().is_some_and(|blocked| {
            context
                .doors
                .iter()
                .any(|door| door.id == blocked && door.area.intersects(&player_box))
        });
        if !still_blocked && context.blocked_door.take().is_some() {
            debug!(room = %context.room_id, "door_unblocked");
        }

        let door_hit = if player_doors {
            context
                .doors
                .iter()
                .filter(|door| context.blocked_door.as_deref() != Some(door.id.as_str()))
                .find(|door| door.area.intersects(&player_box))
                .cloned()
        } else {
            None
        };

        if player_items {
            let mut collected = Vec::new();
            context.items.retain(|pickup| {
                if !pickup.area.intersects(&player_box) {
                    return true;
                }
                collected.push(pickup.spawn.clone());
                false
            });
            for item in collected {
                actors.progress.apply_item(&item);
                actors.player.refresh_capabilities(&*actors.progress);
                events.push(RigEvent::ItemCollected { item: item.id });
            }
        }

        for enemy in &mut context.enemies {
            if enemy.phase() == EnemyPhase::Dying {
                enemy.mark_destroyed();
            }
        }
        context
            .enemies
            .retain(|enemy| enemy.phase() != EnemyPhase::Destroyed);

        if let Some(door) = door_hit {
            let request = self.transition_to_room(&door.target_room, &door.target_spawn, now);
            if request == TransitionRequest::Started {
                self.pending_door = Some(door.id.clone());
                events.push(RigEvent::DoorEntered {
                    door: door.id,
                    target_room: door.target_room,
                });
            }
        }

        events
    }
}

fn push_enemy_damage(events: &mut Vec<RigEvent>, enemy: u64, outcome: EnemyDamage) {
    match outcome {
        EnemyDamage::Rejected => {}
        EnemyDamage::Hurt { hp } => events.push(RigEvent::EnemyHurt { enemy, hp }),
        EnemyDamage::Killed => events.push(RigEvent::EnemyKilled { enemy }),
    }
}

fn fade_fraction(elapsed_ms: f64, duration_ms: f64) -> f32 {
    if duration_ms <= 0.0 {
        return 1.0;
    }
    (elapsed_ms / duration_ms).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gameplay::enemy::CrawlerFactory;
    use crate::app::gameplay::rooms::fixtures::flat_room;
    use crate::app::gameplay::rooms::{DoorDef, EnemySpawn, ItemKind, RoomDefinition};

    const DT: f32 = 1.0 / 60.0;

    struct Harness {
        loader: RoomLoader,
        player: Player,
        bullets: BulletPool,
        progress: ProgressStore,
        tuning: Tuning,
    }

    impl Harness {
        fn new(rooms: Vec<RoomDefinition>) -> Self {
            let tuning = Tuning::default();
            let catalog = Arc::new(RoomCatalog::from_rooms(rooms).expect("catalog"));
            Self {
                loader: RoomLoader::new(catalog, &tuning, Box::new(CrawlerFactory::new(&tuning))),
                player: Player::new(&tuning),
                bullets: BulletPool::default(),
                progress: ProgressStore::volatile(),
                tuning,
            }
        }

        fn load(&mut self, room: &str, spawn: &str) -> Result<(), RoomLoadError> {
            self.loader.load_room(
                room,
                spawn,
                &mut Actors {
                    player: &mut self.player,
                    bullets: &mut self.bullets,
                    progress: &mut self.progress,
                },
            )
        }

        fn step(&mut self, now: f64) -> Vec<RigEvent> {
            self.loader.step(
                DT,
                now,
                &mut Actors {
                    player: &mut self.player,
                    bullets: &mut self.bullets,
                    progress: &mut self.progress,
                },
            )
        }

        fn advance(&mut self, now: f64) -> TransitionProgress {
            self.loader.advance_transition(
                now,
                &mut Actors {
                    player: &mut self.player,
                    bullets: &mut self.bullets,
                    progress: &mut self.progress,
                },
            )
        }

        fn context(&self) -> &RoomContext {
            self.loader.current().expect("room loaded")
        }
    }

    fn walled_room() -> RoomDefinition {
        let mut room = flat_room("a", 20, 8, TilePos::new(3, 6));
        room.grid.add_wall(10, 0, 7);
        room.spawns.insert("east".to_string(), TilePos::new(15, 6));
        room
    }

    fn enemy_room() -> RoomDefinition {
        let mut room = flat_room("b", 20, 8, TilePos::new(2, 6));
        room.enemies.push(EnemySpawn {
            id: "b_enemy".to_string(),
            archetype: "crawler".to_string(),
            tile: TilePos::new(12, 6),
            patrol_min_x: 10,
            patrol_max_x: 14,
        });
        room.items.push(ItemSpawn {
            id: "m1".to_string(),
            kind: ItemKind::MissilePack,
            tile: TilePos::new(5, 6),
            amount: Some(5),
            level: None,
        });
        room.items.push(ItemSpawn {
            id: "dash".to_string(),
            kind: ItemKind::DashModule,
            tile: TilePos::new(18, 6),
            amount: None,
            level: None,
        });
        room
    }

    #[test]
    fn load_builds_room_and_marks_it_visited() {
        let mut harness = Harness::new(vec![walled_room(), enemy_room()]);
        harness.load("b", "start").expect("load");

        let context = harness.context();
        assert_eq!(context.room_id, "b");
        assert_eq!((context.pixel_width, context.pixel_height), (320.0, 128.0));
        assert_eq!(context.enemies.len(), 1);
        assert_eq!(context.enemies[0].min_x, 168.0);
        assert_eq!(context.enemies[0].max_x, 232.0);
        assert_eq!(context.items.len(), 2);
        assert_eq!(context.colliders.len(), Relationship::ALL.len());
        assert_eq!((harness.player.body.x, harness.player.body.y), (40.0, 104.0));
        assert!(harness.progress.is_room_visited("b"));
        assert_eq!(harness.loader.physics().bounds().right, 320.0);
    }

    #[test]
    fn unknown_spawn_falls_back_to_start() {
        let mut harness = Harness::new(vec![walled_room()]);
        harness.load("a", "nowhere").expect("load");
        assert_eq!(harness.context().spawn_id, "start");
        harness.load("a", "east").expect("load");
        assert_eq!(harness.player.body.x, 15.0 * TILE_SIZE + 8.0);
    }

    #[test]
    fn reloading_keeps_exactly_one_collider_set() {
        let mut harness = Harness::new(vec![walled_room(), enemy_room()]);
        harness.load("a", "start").expect("first");
        harness.load("a", "start").expect("second");

        let colliders = &harness.loader.physics().colliders;
        assert_eq!(colliders.live_count(), Relationship::ALL.len());
        for relationship in Relationship::ALL {
            assert_eq!(colliders.live_for(relationship), 1, "{}", relationship.name());
        }

        harness.load("b", "start").expect("third");
        assert_eq!(
            harness.loader.physics().colliders.live_count(),
            Relationship::ALL.len()
        );
    }

    #[test]
    fn bullet_in_wall_after_rapid_reload_is_destroyed_once() {
        let mut harness = Harness::new(vec![walled_room()]);
        harness.load("a", "start").expect("first");
        harness.load("a", "start").expect("second");

        harness.bullets.spawn(168.0, 40.0, 0.0, 0.0, 450.0);
        assert!(harness.step(20.0).is_empty(), "grace period protects new bullets");

        let events = harness.step(60.0);
        let stopped: Vec<_> = events
            .iter()
            .filter(|event| matches!(event, RigEvent::BulletStopped { by: BulletStop::Tile, .. }))
            .collect();
        assert_eq!(stopped.len(), 1);
        assert_eq!(harness.bullets.active_count(), 0);
        assert!(harness.step(80.0).is_empty());
    }

    #[test]
    fn teardown_tolerates_already_disposed_colliders() {
        let mut harness = Harness::new(vec![walled_room()]);
        harness.load("a", "start").expect("first");
        let handle = harness.context().colliders[&Relationship::PlayerDoors];
        assert!(harness.loader.physics.colliders.dispose(handle));

        harness.load("a", "start").expect("second");
        assert_eq!(
            harness.loader.physics().colliders.live_count(),
            Relationship::ALL.len()
        );
    }

    #[test]
    fn unknown_room_leaves_current_room_intact() {
        let mut harness = Harness::new(vec![walled_room(), enemy_room()]);
        harness.load("b", "start").expect("load");
        harness.bullets.spawn(100.0, 40.0, 0.0, 0.0, 450.0);
        let player_x = harness.player.body.x;

        let error = harness.load("missing", "start").expect_err("must fail");
        assert_eq!(
            error,
            RoomLoadError::RoomNotFound {
                room: "missing".to_string()
            }
        );
        assert_eq!(harness.context().room_id, "b");
        assert_eq!(harness.context().enemies.len(), 1);
        assert_eq!(harness.context().items.len(), 2);
        assert_eq!(harness.bullets.active_count(), 1);
        assert_eq!(harness.player.body.x, player_x);
        assert_eq!(
            harness.loader.physics().colliders.live_count(),
            Relationship::ALL.len()
        );
    }

    #[test]
    fn first_transition_wins_and_lock_holds_until_fade_in_ends() {
        let mut harness = Harness::new(vec![walled_room(), enemy_room()]);
        harness.load("a", "start").expect("load");

        assert_eq!(
            harness.loader.transition_to_room("b", "start", 0.0),
            TransitionRequest::Started
        );
        assert_eq!(
            harness.loader.transition_to_room("a", "east", 10.0),
            TransitionRequest::Dropped
        );
        assert_eq!(harness.advance(100.0), TransitionProgress::None);
        assert_eq!(harness.context().room_id, "a");
        assert!((harness.loader.fade_level(80.0) - 0.5).abs() < 1e-6);

        assert_eq!(
            harness.advance(160.0),
            TransitionProgress::Loaded {
                room_id: "b".to_string()
            }
        );
        assert_eq!(harness.context().room_id, "b");
        assert_eq!(harness.loader.fade_level(160.0), 1.0);
        assert_eq!(
            harness.loader.transition_to_room("a", "start", 200.0),
            TransitionRequest::Dropped
        );

        assert_eq!(harness.advance(340.0), TransitionProgress::Completed);
        assert!(!harness.loader.is_transition_locked());
        assert_eq!(harness.loader.fade_level(340.0), 0.0);
        assert_eq!(
            harness.loader.transition_to_room("a", "start", 341.0),
            TransitionRequest::Started
        );
    }

    #[test]
    fn failed_transition_keeps_room_and_releases_lock() {
        let mut harness = Harness::new(vec![walled_room()]);
        harness.load("a", "start").expect("load");

        harness.loader.transition_to_room("void", "start", 0.0);
        assert!(matches!(
            harness.advance(200.0),
            TransitionProgress::LoadFailed(RoomLoadError::RoomNotFound { .. })
        ));
        assert_eq!(harness.context().room_id, "a");
        assert_eq!(harness.advance(400.0), TransitionProgress::Completed);
        assert!(!harness.loader.is_transition_locked());
    }

    #[test]
    fn door_to_missing_room_waits_for_the_player_to_step_off() {
        let mut room = walled_room();
        room.doors.push(DoorDef {
            id: "a_to_void".to_string(),
            tile: TilePos::new(2, 4),
            tile_width: 3,
            tile_height: 3,
            target_room: "void".to_string(),
            target_spawn: "start".to_string(),
        });
        let mut harness = Harness::new(vec![room]);
        harness.load("a", "start").expect("load");

        let entered = |events: &[RigEvent]| {
            events
                .iter()
                .any(|event| matches!(event, RigEvent::DoorEntered { .. }))
        };

        assert!(entered(&harness.step(0.0)));
        assert!(matches!(
            harness.advance(200.0),
            TransitionProgress::LoadFailed(RoomLoadError::RoomNotFound { .. })
        ));
        assert_eq!(harness.advance(400.0), TransitionProgress::Completed);

        for frame in 0..30 {
            assert!(!entered(&harness.step(416.0 + frame as f64 * 16.0)));
        }
        assert!(!harness.loader.is_transition_locked());
        assert_eq!(harness.context().room_id, "a");

        harness.player.body.place_at(15.0 * TILE_SIZE + 8.0, 112.0);
        assert!(!entered(&harness.step(1000.0)));
        harness.player.body.place_at(3.0 * TILE_SIZE + 8.0, 112.0);
        assert!(entered(&harness.step(1016.0)));
    }

    #[test]
    fn door_overlap_starts_a_single_transition() {
        let mut room = walled_room();
        room.doors.push(DoorDef {
            id: "a_to_b".to_string(),
            tile: TilePos::new(2, 4),
            tile_width: 3,
            tile_height: 3,
            target_room: "b".to_string(),
            target_spawn: "start".to_string(),
        });
        let mut harness = Harness::new(vec![room, enemy_room()]);
        harness.load("a", "start").expect("load");

        let events = harness.step(0.0);
        assert!(events.contains(&RigEvent::DoorEntered {
            door: "a_to_b".to_string(),
            target_room: "b".to_string()
        }));
        assert!(harness.loader.is_transition_locked());
        assert!(harness
            .step(16.0)
            .iter()
            .all(|event| !matches!(event, RigEvent::DoorEntered { .. })));
    }

    #[test]
    fn item_pickup_updates_progress_and_never_respawns() {
        let mut harness = Harness::new(vec![enemy_room()]);
        harness.load("b", "start").expect("load");
        harness.player.body.place_at(5.0 * TILE_SIZE + 8.0, 104.0);

        let events = harness.step(0.0);
        assert!(events.contains(&RigEvent::ItemCollected {
            item: "m1".to_string()
        }));
        assert_eq!(harness.progress.ammo().missile, 5);
        assert_eq!(harness.context().items.len(), 1);

        harness.player.body.place_at(18.0 * TILE_SIZE + 8.0, 104.0);
        harness.step(16.0);
        assert!(harness.player.state.can_dash);

        harness.load("b", "start").expect("reload");
        assert!(harness.context().items.is_empty());
        assert_eq!(harness.progress.ammo().missile, 5);
    }

    #[test]
    fn bullets_damage_enemies_until_they_are_removed() {
        let mut harness = Harness::new(vec![enemy_room()]);
        harness.load("b", "start").expect("load");
        let tuning = harness.tuning.clone();

        let mut killed = 0;
        let mut hurt = 0;
        let mut now = 0.0;
        for _ in 0..3 {
            let enemy = &harness.context().enemies[0];
            let (x, y) = (enemy.body.x - 2.0, enemy.body.y - 7.0);
            harness.bullets.spawn(x, y, tuning.bullet_speed, now, tuning.bullet_lifespan_ms);
            for event in harness.step(now) {
                match event {
                    RigEvent::EnemyHurt { .. } => hurt += 1,
                    RigEvent::EnemyKilled { .. } => killed += 1,
                    _ => {}
                }
            }
            now += 100.0;
        }

        assert_eq!((hurt, killed), (2, 1));
        assert!(harness.context().enemies.is_empty());
        assert_eq!(harness.bullets.active_count(), 0);
    }

    #[test]
    fn touching_an_enemy_reports_contact_damage() {
        let mut harness = Harness::new(vec![enemy_room()]);
        harness.load("b", "start").expect("load");
        let enemy_x = harness.context().enemies[0].body.x;
        harness.player.body.place_at(enemy_x, 104.0);

        let events = harness.step(0.0);
        assert!(events
            .iter()
            .any(|event| matches!(event, RigEvent::PlayerTouchedEnemy { damage: 1, .. })));
        assert_eq!(harness.context().enemies[0].hp, 3);
    }
}
