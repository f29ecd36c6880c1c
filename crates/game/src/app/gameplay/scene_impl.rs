use std::collections::BTreeMap;

use engine::{
    EntityId, InputSnapshot, RenderableDesc, RenderableKind, Scene, SceneCommand, SceneWorld,
    Tilemap, Transform, Vec2,
};
use tracing::{error, info, warn};

use super::physics::Aabb;
use super::room_loader::RoomContext;
use super::rooms::{ItemKind, INITIAL_ROOM, TILE_SIZE};
use super::session::GameSession;

const PLAYER_COLOR: [u8; 4] = [96, 200, 255, 255];
const ENEMY_COLOR: [u8; 4] = [214, 84, 72, 255];
const ENEMY_FLASH_COLOR: [u8; 4] = [255, 255, 255, 255];
const BULLET_COLOR: [u8; 4] = [255, 236, 120, 255];
const DOOR_COLOR: [u8; 4] = [72, 64, 140, 255];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ActorKey {
    Door(String),
    Item(String),
    Enemy(u64),
    Player,
    Bullet(u64),
}

struct Visual {
    position: Vec2,
    renderable: RenderableDesc,
    alpha: f32,
}

/// Engine-facing wrapper: runs the session on fixed ticks and mirrors its
/// pixel-space state into the y-up world the renderer draws.
pub(crate) struct CavernScene {
    session: GameSession,
    entities: BTreeMap<ActorKey, EntityId>,
    mirrored_room: Option<String>,
    start_failed: bool,
}

impl CavernScene {
    pub(crate) fn new(session: GameSession) -> Self {
        Self {
            session,
            entities: BTreeMap::new(),
            mirrored_room: None,
            start_failed: false,
        }
    }

    fn sync_world(&mut self, world: &mut SceneWorld) {
        let Some(room) = self.session.room() else {
            return;
        };

        if self.mirrored_room.as_deref() != Some(room.room_id.as_str()) {
            match build_room_tilemap(room) {
                Ok(tilemap) => world.set_tilemap(tilemap),
                Err(error) => warn!(room = %room.room_id, error = %error, "tilemap_build_failed"),
            }
            self.mirrored_room = Some(room.room_id.clone());
        }

        let visuals = self.collect_visuals(room);

        let stale: Vec<ActorKey> = self
            .entities
            .keys()
            .filter(|key| !visuals.contains_key(*key))
            .cloned()
            .collect();
        for key in stale {
            if let Some(id) = self.entities.remove(&key) {
                world.despawn(id);
            }
        }

        for (key, visual) in visuals {
            match self.entities.get(&key) {
                Some(id) => {
                    if let Some(entity) = world.find_entity_mut(*id) {
                        entity.transform.position = visual.position;
                        entity.renderable = visual.renderable;
                        entity.alpha = visual.alpha;
                    }
                }
                None => {
                    let id = world.spawn(
                        Transform {
                            position: visual.position,
                        },
                        visual.renderable,
                    );
                    self.entities.insert(key, id);
                }
            }
        }

        let (center_x, center_y) = self.session.camera().view_center();
        let camera = world.camera_mut();
        camera.position = to_world(room, center_x, center_y);
        camera.set_zoom_clamped(self.session.camera().zoom as f32);
        world.set_fade_level(self.session.fade_level());
    }

    fn collect_visuals(&self, room: &RoomContext) -> BTreeMap<ActorKey, Visual> {
        let now = self.session.now();
        let mut visuals = BTreeMap::new();

        for door in &room.doors {
            visuals.insert(
                ActorKey::Door(door.id.clone()),
                area_visual(room, &door.area, DOOR_COLOR, "door"),
            );
        }
        for item in &room.items {
            visuals.insert(
                ActorKey::Item(item.spawn.id.clone()),
                area_visual(room, &item.area, item_color(item.spawn.kind), "item"),
            );
        }
        for enemy in room.enemies.iter().filter(|enemy| enemy.is_active()) {
            let color = if enemy.is_flashing(now) {
                ENEMY_FLASH_COLOR
            } else {
                ENEMY_COLOR
            };
            visuals.insert(
                ActorKey::Enemy(enemy.runtime_id),
                area_visual(room, &enemy.body.aabb(), color, "crawler"),
            );
        }

        let player = self.session.player();
        let mut player_visual = area_visual(room, &player.body.aabb(), PLAYER_COLOR, "player");
        player_visual.alpha = player.alpha(now, self.session.tuning());
        visuals.insert(ActorKey::Player, player_visual);

        for bullet in self.session.bullets().active() {
            visuals.insert(
                ActorKey::Bullet(bullet.id),
                area_visual(room, &bullet.aabb(), BULLET_COLOR, "bullet"),
            );
        }
        visuals
    }
}

fn to_world(room: &RoomContext, px: f32, py: f32) -> Vec2 {
    Vec2 {
        x: px / TILE_SIZE,
        y: (room.pixel_height - py) / TILE_SIZE,
    }
}

fn area_visual(room: &RoomContext, area: &Aabb, color: [u8; 4], debug_name: &'static str) -> Visual {
    let center_y = (area.top + area.bottom) / 2.0;
    Visual {
        position: to_world(room, area.center_x(), center_y),
        renderable: RenderableDesc {
            kind: RenderableKind::Rect {
                half_extents: Vec2 {
                    x: (area.right - area.left) / 2.0 / TILE_SIZE,
                    y: (area.bottom - area.top) / 2.0 / TILE_SIZE,
                },
                color,
            },
            debug_name,
        },
        alpha: 1.0,
    }
}

fn item_color(kind: ItemKind) -> [u8; 4] {
    match kind {
        ItemKind::DashModule => [120, 255, 160, 255],
        ItemKind::MissilePack => [255, 150, 60, 255],
        ItemKind::SuperPack => [220, 90, 255, 255],
        ItemKind::SuitUpgrade => [255, 220, 80, 255],
    }
}

/// Row 0 of the engine tilemap is the bottom row of the room.
fn build_room_tilemap(room: &RoomContext) -> Result<Tilemap, engine::TilemapError> {
    let width = room.solids.width();
    let height = room.solids.height();
    let mut tiles = Vec::with_capacity(width as usize * height as usize);
    for row in 0..height {
        let grid_y = (height - 1 - row) as i32;
        for x in 0..width {
            tiles.push(u16::from(room.solids.is_solid_tile(x as i32, grid_y)));
        }
    }
    Tilemap::new(width, height, Vec2 { x: 0.0, y: 0.0 }, tiles)
}

impl Scene for CavernScene {
    fn load(&mut self, world: &mut SceneWorld) {
        self.entities.clear();
        self.mirrored_room = None;
        match self.session.start(INITIAL_ROOM) {
            Ok(()) => {
                self.start_failed = false;
                self.sync_world(world);
                world.apply_pending();
                info!(entity_count = world.entity_count(), "scene_loaded");
            }
            Err(error) => {
                self.start_failed = true;
                error!(room = INITIAL_ROOM, error = %error, "initial_room_failed");
            }
        }
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        if self.start_failed {
            return SceneCommand::Exit;
        }

        if let Err(frame_error) = self.session.tick(fixed_dt_seconds, input) {
            error!(error = %frame_error, "frame_error");
            self.session.report_error(&frame_error.to_string());
        }
        self.sync_world(world);
        SceneCommand::None
    }

    fn render(&mut self, _world: &SceneWorld) {}

    fn unload(&mut self, world: &mut SceneWorld) {
        info!(
            entity_count = world.entity_count(),
            visited = self.session.progress().visited_count(),
            "scene_unload"
        );
        for (_, id) in std::mem::take(&mut self.entities) {
            world.despawn(id);
        }
        world.clear_tilemap();
        self.mirrored_room = None;
    }

    fn window_title(&self, _world: &SceneWorld) -> Option<String> {
        if self.start_failed {
            return None;
        }
        Some(self.session.hud_title())
    }
}
