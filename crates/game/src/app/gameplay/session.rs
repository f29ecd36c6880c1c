//! Per-frame orchestration of the loaded room, the player and the HUD.

use std::sync::Arc;

use engine::{InputAction, InputSnapshot};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::bullets::BulletPool;
use super::camera::PixelCamera;
use super::enemy::EnemyFactory;
use super::hud::{Hud, HudView};
use super::player::{DamageOutcome, MoveIntent, Player};
use super::progress::ProgressStore;
use super::room_loader::{
    Actors, RigEvent, RoomContext, RoomLoadError, RoomLoader, TransitionProgress,
};
use super::rooms::{RoomCatalog, START_SPAWN};
use super::tuning::Tuning;

#[derive(Debug, Error)]
pub(crate) enum FrameError {
    #[error("no room is loaded")]
    NoActiveRoom,
    #[error("respawn failed: {0}")]
    Respawn(#[source] RoomLoadError),
}

pub(crate) struct GameSession {
    tuning: Tuning,
    loader: RoomLoader,
    player: Player,
    bullets: BulletPool,
    progress: ProgressStore,
    camera: PixelCamera,
    hud: Hud,
    clock_ms: f64,
    ground_snap_enabled: bool,
}

impl GameSession {
    pub(crate) fn new(
        tuning: Tuning,
        catalog: Arc<RoomCatalog>,
        progress: ProgressStore,
        factory: Box<dyn EnemyFactory>,
    ) -> Self {
        let mut player = Player::new(&tuning);
        player.refresh_capabilities(&progress);
        Self {
            loader: RoomLoader::new(catalog, &tuning, factory),
            player,
            bullets: BulletPool::default(),
            progress,
            camera: PixelCamera::default(),
            hud: Hud::default(),
            clock_ms: 0.0,
            ground_snap_enabled: true,
            tuning,
        }
    }

    /// Loads the first room at its start spawn. A failure here leaves the
    /// session without a room and is fatal for the caller.
    pub(crate) fn start(&mut self, room_id: &str) -> Result<(), RoomLoadError> {
        self.loader.load_room(
            room_id,
            START_SPAWN,
            &mut Actors {
                player: &mut self.player,
                bullets: &mut self.bullets,
                progress: &mut self.progress,
            },
        )?;
        info!(
            room = room_id,
            visited = self.progress.visited_count(),
            "session_started"
        );
        Ok(())
    }

    pub(crate) fn tick(&mut self, dt: f32, input: &InputSnapshot) -> Result<(), FrameError> {
        self.clock_ms += f64::from(dt) * 1000.0;
        let now = self.clock_ms;
        if self.loader.current().is_none() {
            return Err(FrameError::NoActiveRoom);
        }

        let (window_width, window_height) = input.window_size();
        self.camera.resize(window_width, window_height);

        if input.just_pressed(InputAction::ToggleGroundSnap) {
            self.ground_snap_enabled = !self.ground_snap_enabled;
            info!(enabled = self.ground_snap_enabled, "ground_snap_toggled");
        }

        let intent = MoveIntent::from_input(input);
        self.player.apply_movement(&intent, now, &self.tuning);
        if intent.fire {
            if let Some(shot) = self.player.try_fire(now, &self.tuning) {
                self.bullets.spawn(
                    shot.x,
                    shot.y,
                    shot.direction * self.tuning.bullet_speed,
                    now,
                    self.tuning.bullet_lifespan_ms,
                );
                self.hud.flash_muzzle(now, self.tuning.muzzle_flash_ms);
            }
        }

        // Uses the ground contact from the previous step, before integration clears it.
        if self.ground_snap_enabled {
            if let Some(context) = self.loader.current() {
                self.loader.physics().ground_snap(
                    &mut self.player.body,
                    &context.solids,
                    self.tuning.ground_snap_tolerance,
                    self.tuning.ground_snap_max_vy,
                );
            }
        }

        let events = self.loader.step(
            dt,
            now,
            &mut Actors {
                player: &mut self.player,
                bullets: &mut self.bullets,
                progress: &mut self.progress,
            },
        );

        for event in events {
            self.handle_event(event, now)?;
        }

        match self.loader.advance_transition(
            now,
            &mut Actors {
                player: &mut self.player,
                bullets: &mut self.bullets,
                progress: &mut self.progress,
            },
        ) {
            TransitionProgress::LoadFailed(error) => {
                self.hud
                    .report_error(&error.to_string(), now, self.tuning.diagnostic_ms);
            }
            TransitionProgress::Loaded { room_id } => {
                let spawn = self.loader.current().map(|room| room.spawn_id.as_str());
                debug!(room = %room_id, spawn = ?spawn, "transition_room_ready");
            }
            TransitionProgress::None | TransitionProgress::Completed => {}
        }

        let (view_left, view_right) = self.camera.horizontal_view();
        self.bullets.retire(
            now,
            view_left - self.tuning.bullet_cull_margin,
            view_right + self.tuning.bullet_cull_margin,
        );

        let (room_width, room_height) = self.room_pixel_size()?;
        if self.player.body.y > room_height + self.tuning.fall_out_margin {
            debug!(y = self.player.body.y, "player_fell_out");
            if self.player.damage(self.tuning.fall_out_damage, now, &self.tuning)
                == DamageOutcome::Died
            {
                self.respawn()?;
            }
        }

        self.camera
            .follow(self.player.body.x, self.player.body.y, room_width, room_height);
        self.hud.expire(now);
        self.hud.set_shots(self.bullets.active_count());
        Ok(())
    }

    fn handle_event(&mut self, event: RigEvent, now: f64) -> Result<(), FrameError> {
        match event {
            RigEvent::PlayerTouchedEnemy {
                enemy,
                damage,
                enemy_x,
            } => match self.player.damage(damage, now, &self.tuning) {
                DamageOutcome::Applied => {
                    self.player.knock_back_from(enemy_x, &self.tuning);
                    debug!(enemy, hp = self.player.state.hp, "player_hurt");
                }
                DamageOutcome::Died => self.respawn()?,
                DamageOutcome::NotApplied => {}
            },
            RigEvent::EnemyKilled { enemy } => debug!(enemy, "enemy_killed"),
            RigEvent::DoorEntered { door, target_room } => {
                debug!(door = %door, target = %target_room, "door_entered");
            }
            RigEvent::ItemCollected { item } => debug!(item = %item, "item_collected"),
            RigEvent::BulletStopped { .. } | RigEvent::EnemyHurt { .. } => {}
        }
        Ok(())
    }

    /// Death puts the player back at the start of the current room without a
    /// fade; health was already refilled by the damage call.
    fn respawn(&mut self) -> Result<(), FrameError> {
        let room_id = self
            .loader
            .current_room_id()
            .ok_or(FrameError::NoActiveRoom)?
            .to_string();
        self.loader
            .load_room(
                &room_id,
                START_SPAWN,
                &mut Actors {
                    player: &mut self.player,
                    bullets: &mut self.bullets,
                    progress: &mut self.progress,
                },
            )
            .map_err(FrameError::Respawn)?;
        info!(room = %room_id, "player_respawned");
        Ok(())
    }

    fn room_pixel_size(&self) -> Result<(f32, f32), FrameError> {
        self.loader
            .current()
            .map(|context| (context.pixel_width, context.pixel_height))
            .ok_or(FrameError::NoActiveRoom)
    }

    pub(crate) fn report_error(&mut self, text: &str) {
        warn!(error = text, "frame_error_reported");
        self.hud
            .report_error(text, self.clock_ms, self.tuning.diagnostic_ms);
    }

    pub(crate) fn now(&self) -> f64 {
        self.clock_ms
    }

    pub(crate) fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub(crate) fn room(&self) -> Option<&RoomContext> {
        self.loader.current()
    }

    pub(crate) fn player(&self) -> &Player {
        &self.player
    }

    pub(crate) fn bullets(&self) -> &BulletPool {
        &self.bullets
    }

    pub(crate) fn camera(&self) -> &PixelCamera {
        &self.camera
    }

    pub(crate) fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub(crate) fn fade_level(&self) -> f32 {
        self.loader.fade_level(self.clock_ms)
    }

    #[cfg(test)]
    pub(crate) fn is_transition_locked(&self) -> bool {
        self.loader.is_transition_locked()
    }

    #[cfg(test)]
    pub(crate) fn ground_snap_enabled(&self) -> bool {
        self.ground_snap_enabled
    }

    pub(crate) fn hud_lines(&self) -> Vec<String> {
        self.hud.lines(&self.hud_view(), self.clock_ms)
    }

    /// HUD lines joined for the window title.
    pub(crate) fn hud_title(&self) -> String {
        self.hud_lines().join(" | ")
    }

    fn hud_view(&self) -> HudView<'_> {
        let ammo = self.progress.ammo();
        HudView {
            hp: self.player.state.hp,
            max_hp: self.player.state.max_hp,
            suit_level: self.progress.suit_level(),
            room_name: self
                .loader
                .current()
                .map_or("-", |context| context.name.as_str()),
            can_dash: self.player.state.can_dash,
            missiles: ammo.missile,
            supers: ammo.super_,
            visited_rooms: self.progress.visited_count(),
            registered_rooms: self.loader.catalog().registered_room_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::gameplay::enemy::CrawlerFactory;
    use crate::app::gameplay::rooms::fixtures::flat_room;
    use crate::app::gameplay::rooms::{CollisionGrid, DoorDef, EnemySpawn, RoomDefinition, TilePos};

    const DT: f32 = 1.0 / 60.0;

    fn session(rooms: Vec<RoomDefinition>) -> GameSession {
        let tuning = Tuning::default();
        let catalog = Arc::new(RoomCatalog::from_rooms(rooms).expect("catalog"));
        let factory = Box::new(CrawlerFactory::new(&tuning));
        GameSession::new(tuning, catalog, ProgressStore::volatile(), factory)
    }

    fn idle() -> InputSnapshot {
        InputSnapshot::empty().with_window_size((1280, 720))
    }

    fn run(session: &mut GameSession, frames: usize, input: &InputSnapshot) {
        for _ in 0..frames {
            session.tick(DT, input).expect("tick");
        }
    }

    #[test]
    fn tick_without_room_is_an_error() {
        let mut session = session(vec![flat_room("a", 8, 6, TilePos::new(3, 3))]);
        assert!(matches!(
            session.tick(DT, &idle()),
            Err(FrameError::NoActiveRoom)
        ));
    }

    #[test]
    fn start_with_unknown_room_fails() {
        let mut session = session(vec![flat_room("a", 8, 6, TilePos::new(3, 3))]);
        assert_eq!(
            session.start("missing"),
            Err(RoomLoadError::RoomNotFound {
                room: "missing".to_string()
            })
        );
        assert!(session.room().is_none());
    }

    #[test]
    fn player_settles_on_the_floor_and_stays_there() {
        let mut session = session(vec![flat_room("a", 8, 6, TilePos::new(3, 3))]);
        session.start("a").expect("start");

        let mut frames = 0;
        while !session.player().body.grounded() {
            session.tick(DT, &idle()).expect("tick");
            frames += 1;
            assert!(frames < 300, "player never landed");
        }
        assert_eq!(session.player().body.bottom(), 80.0);

        run(&mut session, 120, &idle());
        assert_eq!(session.player().body.bottom(), 80.0);
        assert!(session.player().body.grounded());
        assert_eq!(session.player().body.vy, 0.0);
    }

    #[test]
    fn ground_snap_toggles_on_key_edge() {
        let mut session = session(vec![flat_room("a", 8, 6, TilePos::new(3, 3))]);
        session.start("a").expect("start");
        assert!(session.ground_snap_enabled());

        let toggle = idle().with_action_pressed(InputAction::ToggleGroundSnap);
        session.tick(DT, &toggle).expect("tick");
        assert!(!session.ground_snap_enabled());
        session.tick(DT, &toggle).expect("tick");
        assert!(session.ground_snap_enabled());
    }

    #[test]
    fn ground_snap_removes_drift_only_while_enabled() {
        let mut session = session(vec![flat_room("a", 8, 6, TilePos::new(3, 3))]);
        session.start("a").expect("start");
        run(&mut session, 90, &idle());
        assert!(session.player().body.grounded());

        session.player.body.y -= 0.3;
        session.tick(DT, &idle()).expect("tick");
        assert_eq!(session.player().body.bottom(), 80.0);
        assert!(session.player().body.grounded());

        let toggle = idle().with_action_pressed(InputAction::ToggleGroundSnap);
        session.tick(DT, &toggle).expect("tick");
        assert!(!session.ground_snap_enabled());

        session.player.body.y -= 0.3;
        session.tick(DT, &idle()).expect("tick");
        assert!(session.player().body.bottom() < 80.0);
        assert!(!session.player().body.grounded());
    }

    #[test]
    fn firing_spawns_one_rate_limited_bullet_and_flashes() {
        let mut session = session(vec![flat_room("a", 40, 6, TilePos::new(3, 4))]);
        session.start("a").expect("start");
        run(&mut session, 60, &idle());

        let fire = idle().with_action_pressed(InputAction::Fire);
        session.tick(DT, &fire).expect("tick");
        assert_eq!(session.bullets().active_count(), 1);
        assert!(session.hud_lines().iter().any(|line| line == "PEW!"));

        session.tick(DT, &fire).expect("tick");
        assert_eq!(session.bullets().active_count(), 1);
        assert!(session
            .hud_lines()
            .last()
            .is_some_and(|line| line == "Shots: 1"));
    }

    #[test]
    fn falling_out_of_the_room_respawns_at_start() {
        let mut room = flat_room("a", 8, 6, TilePos::new(3, 3));
        room.grid = CollisionGrid::new(8, 6);
        let mut session = session(vec![room]);
        session.start("a").expect("start");

        let mut respawned = false;
        for _ in 0..600 {
            session.tick(DT, &idle()).expect("tick");
            if session.player().body.y < 60.0 && session.now() > 500.0 {
                respawned = true;
                break;
            }
        }
        assert!(respawned);
        assert_eq!(session.player().state.hp, session.player().state.max_hp);
    }

    #[test]
    fn lethal_contact_reloads_current_room() {
        let mut room = flat_room("a", 20, 6, TilePos::new(3, 4));
        room.enemies.push(EnemySpawn {
            id: "crawler".to_string(),
            archetype: "crawler".to_string(),
            tile: TilePos::new(3, 4),
            patrol_min_x: 2,
            patrol_max_x: 4,
        });
        let mut session = session(vec![room]);
        session.start("a").expect("start");
        session.player.state.hp = 1;

        run(&mut session, 3, &idle());
        assert_eq!(session.player().state.hp, session.player().state.max_hp);
        assert_eq!(session.room().map(|room| room.room_id.as_str()), Some("a"));
    }

    #[test]
    fn door_transition_reaches_target_room_after_fade() {
        let mut first = flat_room("a", 20, 6, TilePos::new(3, 4));
        first.doors.push(DoorDef {
            id: "a_to_b".to_string(),
            tile: TilePos::new(2, 2),
            tile_width: 3,
            tile_height: 3,
            target_room: "b".to_string(),
            target_spawn: "start".to_string(),
        });
        let second = flat_room("b", 20, 6, TilePos::new(10, 4));
        let mut session = session(vec![first, second]);
        session.start("a").expect("start");

        session.tick(DT, &idle()).expect("tick");
        assert!(session.is_transition_locked());
        assert_eq!(session.room().map(|room| room.room_id.as_str()), Some("a"));

        run(&mut session, 12, &idle());
        assert_eq!(session.room().map(|room| room.room_id.as_str()), Some("b"));
        assert!(session.is_transition_locked());
        assert!(session.fade_level() > 0.0);

        run(&mut session, 14, &idle());
        assert!(!session.is_transition_locked());
        assert_eq!(session.fade_level(), 0.0);
        assert!(session.progress().is_room_visited("b"));
    }

    #[test]
    fn door_to_missing_room_fails_once_without_retrying() {
        let mut room = flat_room("a", 20, 6, TilePos::new(3, 4));
        room.doors.push(DoorDef {
            id: "a_to_void".to_string(),
            tile: TilePos::new(2, 2),
            tile_width: 3,
            tile_height: 3,
            target_room: "void".to_string(),
            target_spawn: "start".to_string(),
        });
        let mut session = session(vec![room]);
        session.start("a").expect("start");

        let mut fades_started = 0;
        let mut was_locked = false;
        for _ in 0..120 {
            session.tick(DT, &idle()).expect("tick");
            let locked = session.is_transition_locked();
            if locked && !was_locked {
                fades_started += 1;
            }
            was_locked = locked;
        }

        assert_eq!(fades_started, 1);
        assert!(!session.is_transition_locked());
        assert_eq!(session.fade_level(), 0.0);
        assert_eq!(session.room().map(|room| room.room_id.as_str()), Some("a"));
        assert!(session.hud_title().contains("void"));
    }

    #[test]
    fn reported_errors_show_on_the_hud() {
        let mut session = session(vec![flat_room("a", 8, 6, TilePos::new(3, 3))]);
        session.start("a").expect("start");
        session.report_error("room  not found:\n room_99");
        assert!(session
            .hud_title()
            .contains("LastError: room not found: room_99"));
    }
}
