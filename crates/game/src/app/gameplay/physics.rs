//! Arcade-style physics in room pixel space: y grows downward, bodies are
//! anchored at the centre of their feet, tiles are `TILE_SIZE` squares.

use super::rooms::{CollisionGrid, TILE_SIZE};

const SNAP_EPSILON: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Aabb {
    pub(crate) left: f32,
    pub(crate) top: f32,
    pub(crate) right: f32,
    pub(crate) bottom: f32,
}

impl Aabb {
    pub(crate) fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            left: cx - width / 2.0,
            top: cy - height / 2.0,
            right: cx + width / 2.0,
            bottom: cy + height / 2.0,
        }
    }

    /// Touching edges do not count.
    pub(crate) fn intersects(&self, other: &Aabb) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }

    pub(crate) fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Blocked {
    pub(crate) left: bool,
    pub(crate) right: bool,
    pub(crate) up: bool,
    pub(crate) down: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Body {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) vx: f32,
    pub(crate) vy: f32,
    pub(crate) allow_gravity: bool,
    pub(crate) collide_world_bounds: bool,
    pub(crate) blocked: Blocked,
}

impl Body {
    pub(crate) fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            vx: 0.0,
            vy: 0.0,
            allow_gravity: true,
            collide_world_bounds: true,
            blocked: Blocked::default(),
        }
    }

    pub(crate) fn left(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub(crate) fn right(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub(crate) fn top(&self) -> f32 {
        self.y - self.height
    }

    pub(crate) fn bottom(&self) -> f32 {
        self.y
    }

    pub(crate) fn half_width(&self) -> f32 {
        self.width / 2.0
    }

    pub(crate) fn aabb(&self) -> Aabb {
        Aabb {
            left: self.left(),
            top: self.top(),
            right: self.right(),
            bottom: self.bottom(),
        }
    }

    pub(crate) fn grounded(&self) -> bool {
        self.blocked.down
    }

    pub(crate) fn place_at(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.vx = 0.0;
        self.vy = 0.0;
        self.blocked = Blocked::default();
    }

    /// Changes the height while keeping the feet where they are.
    pub(crate) fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }
}

/// Static solid geometry of the active room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SolidLayer {
    width: u32,
    height: u32,
    solid: Vec<bool>,
}

impl SolidLayer {
    pub(crate) fn from_grid(grid: &CollisionGrid) -> Self {
        let mut solid = Vec::with_capacity(grid.width() as usize * grid.height() as usize);
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                solid.push(grid.is_solid(x, y));
            }
        }
        Self {
            width: grid.width(),
            height: grid.height(),
            solid,
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn solid_count(&self) -> usize {
        self.solid.iter().filter(|cell| **cell).count()
    }

    pub(crate) fn is_solid_tile(&self, tx: i32, ty: i32) -> bool {
        if tx < 0 || ty < 0 || tx as u32 >= self.width || ty as u32 >= self.height {
            return false;
        }
        self.solid
            .get(ty as usize * self.width as usize + tx as usize)
            .copied()
            .unwrap_or(false)
    }

    pub(crate) fn is_solid_at(&self, px: f32, py: f32) -> bool {
        self.is_solid_tile(
            (px / TILE_SIZE).floor() as i32,
            (py / TILE_SIZE).floor() as i32,
        )
    }

    /// Solid tiles strictly overlapping `area`, as pixel rectangles.
    pub(crate) fn overlapping(&self, area: &Aabb) -> Vec<Aabb> {
        let x0 = (area.left / TILE_SIZE).floor() as i32;
        let x1 = (area.right / TILE_SIZE).ceil() as i32 - 1;
        let y0 = (area.top / TILE_SIZE).floor() as i32;
        let y1 = (area.bottom / TILE_SIZE).ceil() as i32 - 1;

        let mut hits = Vec::new();
        for ty in y0..=y1 {
            for tx in x0..=x1 {
                if self.is_solid_tile(tx, ty) {
                    let tile = tile_rect(tx, ty);
                    if tile.intersects(area) {
                        hits.push(tile);
                    }
                }
            }
        }
        hits
    }

    pub(crate) fn overlaps_any(&self, area: &Aabb) -> bool {
        !self.overlapping(area).is_empty()
    }
}

fn tile_rect(tx: i32, ty: i32) -> Aabb {
    Aabb {
        left: tx as f32 * TILE_SIZE,
        top: ty as f32 * TILE_SIZE,
        right: (tx + 1) as f32 * TILE_SIZE,
        bottom: (ty + 1) as f32 * TILE_SIZE,
    }
}

/// Body size in frame pixels plus offset inside the frame, such that the body
/// is horizontally centred and its bottom matches the frame bottom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Hitbox {
    pub(crate) frame_width: u32,
    pub(crate) frame_height: u32,
    pub(crate) offset_x: i32,
    pub(crate) offset_y: i32,
    pub(crate) world_width: f32,
    pub(crate) world_height: f32,
}

pub(crate) fn feet_aligned_hitbox(
    frame_width: u32,
    frame_height: u32,
    scale: f32,
    target_width: f32,
    target_height: f32,
) -> Hitbox {
    let scale = if scale > 0.0 { scale } else { 1.0 };
    let body_w = ((target_width / scale).round() as u32).max(1);
    let body_h = ((target_height / scale).round() as u32).max(1);
    let offset_x = ((frame_width as f32 - body_w as f32) / 2.0).round() as i32;
    let offset_y = (frame_height as f32 - body_h as f32).round() as i32;
    Hitbox {
        frame_width: body_w,
        frame_height: body_h,
        offset_x,
        offset_y,
        world_width: body_w as f32 * scale,
        world_height: body_h as f32 * scale,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Relationship {
    PlayerSolids,
    EnemySolids,
    PlayerEnemies,
    BulletEnemies,
    BulletSolids,
    PlayerDoors,
    PlayerItems,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelationshipKind {
    Collide,
    Overlap,
}

impl Relationship {
    pub(crate) const ALL: [Relationship; 7] = [
        Relationship::PlayerSolids,
        Relationship::EnemySolids,
        Relationship::PlayerEnemies,
        Relationship::BulletEnemies,
        Relationship::BulletSolids,
        Relationship::PlayerDoors,
        Relationship::PlayerItems,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            Relationship::PlayerSolids => "player_solids",
            Relationship::EnemySolids => "enemy_solids",
            Relationship::PlayerEnemies => "player_enemies",
            Relationship::BulletEnemies => "bullet_enemies",
            Relationship::BulletSolids => "bullet_solids",
            Relationship::PlayerDoors => "player_doors",
            Relationship::PlayerItems => "player_items",
        }
    }

    pub(crate) fn kind(self) -> RelationshipKind {
        match self {
            Relationship::PlayerSolids | Relationship::EnemySolids => RelationshipKind::Collide,
            _ => RelationshipKind::Overlap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColliderHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy)]
struct ColliderSlot {
    generation: u32,
    relationship: Option<Relationship>,
}

/// Generational slot table of live collision relationships. Disposing a stale
/// or already disposed handle is a no-op.
#[derive(Debug, Default)]
pub(crate) struct ColliderRegistry {
    slots: Vec<ColliderSlot>,
    free: Vec<u32>,
}

impl ColliderRegistry {
    pub(crate) fn register(&mut self, relationship: Relationship) -> ColliderHandle {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.relationship = Some(relationship);
                return ColliderHandle {
                    index,
                    generation: slot.generation,
                };
            }
        }

        let index = self.slots.len() as u32;
        self.slots.push(ColliderSlot {
            generation: 0,
            relationship: Some(relationship),
        });
        ColliderHandle {
            index,
            generation: 0,
        }
    }

    /// Returns whether the handle was live.
    pub(crate) fn dispose(&mut self, handle: ColliderHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation || slot.relationship.is_none() {
            return false;
        }
        slot.relationship = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        true
    }

    pub(crate) fn is_live(&self, handle: ColliderHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.generation == handle.generation && slot.relationship.is_some())
    }

    #[cfg(test)]
    pub(crate) fn live_for(&self, relationship: Relationship) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.relationship == Some(relationship))
            .count()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.relationship.is_some())
            .count()
    }
}

/// Room-wide physics parameters plus the collider table.
#[derive(Debug)]
pub(crate) struct PhysicsWorld {
    pub(crate) gravity: f32,
    pub(crate) max_fall_speed: f32,
    bounds: Aabb,
    pub(crate) colliders: ColliderRegistry,
}

impl PhysicsWorld {
    pub(crate) fn new(gravity: f32, max_fall_speed: f32) -> Self {
        Self {
            gravity,
            max_fall_speed,
            bounds: Aabb {
                left: 0.0,
                top: 0.0,
                right: 0.0,
                bottom: 0.0,
            },
            colliders: ColliderRegistry::default(),
        }
    }

    pub(crate) fn set_bounds(&mut self, width: f32, height: f32) {
        self.bounds = Aabb {
            left: 0.0,
            top: 0.0,
            right: width,
            bottom: height,
        };
    }

    #[cfg(test)]
    pub(crate) fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// One integration step. Solid response is applied only when `solids` is
    /// given; world bounds hold the sides and the top, never the bottom.
    pub(crate) fn integrate(&self, body: &mut Body, dt: f32, solids: Option<&SolidLayer>) {
        body.blocked = Blocked::default();

        if body.allow_gravity {
            body.vy = (body.vy + self.gravity * dt).min(self.max_fall_speed);
        }

        let dx = body.vx * dt;
        body.x += dx;
        if let Some(solids) = solids {
            resolve_x(body, dx, solids);
        }

        let dy = body.vy * dt;
        body.y += dy;
        if let Some(solids) = solids {
            resolve_y(body, dy, solids);
        }

        if body.collide_world_bounds {
            self.clamp_to_bounds(body);
        }
    }

    fn clamp_to_bounds(&self, body: &mut Body) {
        if body.left() < self.bounds.left {
            body.x = self.bounds.left + body.half_width();
            body.vx = body.vx.max(0.0);
            body.blocked.left = true;
        } else if body.right() > self.bounds.right {
            body.x = self.bounds.right - body.half_width();
            body.vx = body.vx.min(0.0);
            body.blocked.right = true;
        }
        if body.top() < self.bounds.top {
            body.y = self.bounds.top + body.height;
            body.vy = body.vy.max(0.0);
            body.blocked.up = true;
        }
    }

    /// Removes sub-pixel drift for a body resting on a solid tile. Returns
    /// whether a correction was applied.
    pub(crate) fn ground_snap(
        &self,
        body: &mut Body,
        solids: &SolidLayer,
        tolerance: f32,
        max_vy: f32,
    ) -> bool {
        if !body.grounded() || body.vy < 0.0 || body.vy.abs() >= max_vy {
            return false;
        }

        let probe_x = body.x;
        let probe_y = body.bottom() + 1.0;
        let tx = (probe_x / TILE_SIZE).floor() as i32;
        let ty = (probe_y / TILE_SIZE).floor() as i32;
        if !solids.is_solid_tile(tx, ty) {
            return false;
        }

        let tile_top = ty as f32 * TILE_SIZE;
        let delta = tile_top - body.bottom();
        if delta.abs() > tolerance || delta.abs() < SNAP_EPSILON {
            return false;
        }

        body.y = (body.y + delta).round();
        body.vy = 0.0;
        true
    }
}

fn resolve_x(body: &mut Body, dx: f32, solids: &SolidLayer) {
    if dx == 0.0 {
        return;
    }
    let hits = solids.overlapping(&body.aabb());
    if hits.is_empty() {
        return;
    }
    if dx > 0.0 {
        let wall = hits.iter().map(|tile| tile.left).fold(f32::INFINITY, f32::min);
        body.x = wall - body.half_width();
        body.blocked.right = true;
    } else {
        let wall = hits.iter().map(|tile| tile.right).fold(f32::NEG_INFINITY, f32::max);
        body.x = wall + body.half_width();
        body.blocked.left = true;
    }
    body.vx = 0.0;
}

fn resolve_y(body: &mut Body, dy: f32, solids: &SolidLayer) {
    if dy == 0.0 {
        return;
    }
    let hits = solids.overlapping(&body.aabb());
    if hits.is_empty() {
        return;
    }
    if dy > 0.0 {
        let floor = hits.iter().map(|tile| tile.top).fold(f32::INFINITY, f32::min);
        body.y = floor;
        body.blocked.down = true;
    } else {
        let ceiling = hits.iter().map(|tile| tile.bottom).fold(f32::NEG_INFINITY, f32::max);
        body.y = ceiling + body.height;
        body.blocked.up = true;
    }
    body.vy = 0.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn floor_layer(width: u32, height: u32) -> SolidLayer {
        let mut grid = CollisionGrid::new(width, height);
        grid.fill_ground(1);
        SolidLayer::from_grid(&grid)
    }

    fn world_for(layer: &SolidLayer) -> PhysicsWorld {
        let mut world = PhysicsWorld::new(600.0, 600.0);
        world.set_bounds(
            layer.width() as f32 * TILE_SIZE,
            layer.height() as f32 * TILE_SIZE,
        );
        world
    }

    #[test]
    fn falling_body_lands_on_tile_top() {
        let layer = floor_layer(8, 6);
        let world = world_for(&layer);
        let mut body = Body::new(56.0, 40.0, 26.0, 44.0);
        body.y = 56.0;

        for _ in 0..120 {
            world.integrate(&mut body, DT, Some(&layer));
        }
        assert!(body.grounded());
        assert_eq!(body.bottom(), 80.0);
        assert_eq!(body.vy, 0.0);
    }

    #[test]
    fn walls_stop_horizontal_motion() {
        let mut grid = CollisionGrid::new(10, 6);
        grid.fill_ground(1);
        grid.add_wall(6, 0, 5);
        let layer = SolidLayer::from_grid(&grid);
        let world = world_for(&layer);
        let mut body = Body::new(80.0, 80.0, 10.0, 20.0);

        for _ in 0..60 {
            body.vx = 120.0;
            world.integrate(&mut body, DT, Some(&layer));
        }
        assert_eq!(body.right(), 96.0);
        assert!(body.blocked.right);
    }

    #[test]
    fn world_bounds_hold_sides_but_not_bottom() {
        let layer = SolidLayer::from_grid(&CollisionGrid::new(4, 4));
        let world = world_for(&layer);
        let mut body = Body::new(4.0, 40.0, 10.0, 10.0);
        body.vx = -100.0;
        world.integrate(&mut body, DT, Some(&layer));
        assert_eq!(body.left(), 0.0);
        assert!(body.blocked.left);

        for _ in 0..120 {
            world.integrate(&mut body, DT, Some(&layer));
        }
        assert!(body.bottom() > 64.0);
    }

    #[test]
    fn fall_speed_is_capped() {
        let world = PhysicsWorld::new(600.0, 300.0);
        let mut body = Body::new(0.0, 0.0, 4.0, 4.0);
        body.collide_world_bounds = false;
        for _ in 0..240 {
            world.integrate(&mut body, DT, None);
        }
        assert_eq!(body.vy, 300.0);
    }

    #[test]
    fn ground_snap_corrects_small_drift_only() {
        let layer = floor_layer(8, 6);
        let world = world_for(&layer);
        let mut body = Body::new(56.0, 79.7, 26.0, 44.0);
        body.blocked.down = true;
        assert!(world.ground_snap(&mut body, &layer, 0.6, 5.0));
        assert_eq!(body.bottom(), 80.0);

        let mut far = Body::new(56.0, 78.0, 26.0, 44.0);
        far.blocked.down = true;
        assert!(!world.ground_snap(&mut far, &layer, 0.6, 5.0));

        let mut rising = Body::new(56.0, 79.7, 26.0, 44.0);
        rising.blocked.down = true;
        rising.vy = -1.0;
        assert!(!world.ground_snap(&mut rising, &layer, 0.6, 5.0));

        let mut airborne = Body::new(56.0, 79.7, 26.0, 44.0);
        assert!(!world.ground_snap(&mut airborne, &layer, 0.6, 5.0));
    }

    #[test]
    fn only_solid_relationships_collide() {
        let colliding: Vec<Relationship> = Relationship::ALL
            .into_iter()
            .filter(|relationship| relationship.kind() == RelationshipKind::Collide)
            .collect();
        assert_eq!(
            colliding,
            vec![Relationship::PlayerSolids, Relationship::EnemySolids]
        );
    }

    #[test]
    fn hitbox_bottom_matches_frame_bottom() {
        let hitbox = feet_aligned_hitbox(400, 700, 0.07, 26.0, 44.0);
        assert_eq!(hitbox.frame_width, 371);
        assert_eq!(hitbox.frame_height, 629);
        assert_eq!(hitbox.offset_x, 15);
        assert_eq!(hitbox.offset_y, 71);
        assert_eq!(hitbox.offset_y as u32 + hitbox.frame_height, 700);
        assert!((hitbox.world_height - 44.0).abs() < 0.05);
    }

    #[test]
    fn stale_collider_handles_are_tolerated() {
        let mut registry = ColliderRegistry::default();
        let first = registry.register(Relationship::PlayerDoors);
        assert!(registry.dispose(first));
        assert!(!registry.dispose(first));

        let reused = registry.register(Relationship::PlayerItems);
        assert!(!registry.is_live(first));
        assert!(registry.is_live(reused));
        assert!(!registry.dispose(first));
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.live_for(Relationship::PlayerItems), 1);
        assert_eq!(registry.live_for(Relationship::PlayerDoors), 0);
    }

    #[test]
    fn overlap_query_ignores_touching_tiles() {
        let layer = floor_layer(4, 4);
        let touching = Aabb {
            left: 0.0,
            top: 40.0,
            right: 10.0,
            bottom: 48.0,
        };
        assert!(!layer.overlaps_any(&touching));
        let sunk = Aabb {
            bottom: 48.5,
            ..touching
        };
        assert!(layer.overlaps_any(&sunk));
        assert!(layer.is_solid_at(1.0, 50.0));
        assert!(!layer.is_solid_at(-1.0, 50.0));
    }
}
