use tracing::{debug, warn};

use super::physics::{feet_aligned_hitbox, Body, SolidLayer};
use super::tuning::Tuning;

pub(crate) const CRAWLER_ARCHETYPE: &str = "crawler";
pub(crate) const CRAWLER_SCALE: f32 = 0.07;
pub(crate) const CRAWLER_FRAME: (u32, u32) = (320, 240);
pub(crate) const CRAWLER_HITBOX: (f32, f32) = (18.0, 14.0);

const LEDGE_PROBE_AHEAD: f32 = 2.0;
const LEDGE_PROBE_BELOW: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnemyPhase {
    Patrolling,
    Dying,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnemyDamage {
    Rejected,
    Hurt { hp: u32 },
    Killed,
}

#[derive(Debug, Clone)]
pub(crate) struct Enemy {
    pub(crate) runtime_id: u64,
    pub(crate) spawn_id: String,
    pub(crate) body: Body,
    pub(crate) min_x: f32,
    pub(crate) max_x: f32,
    pub(crate) direction: f32,
    pub(crate) speed: f32,
    pub(crate) hp: u32,
    pub(crate) damage_to_player: u32,
    pub(crate) hit_invulnerable_until: f64,
    pub(crate) hit_flash_until: f64,
    phase: EnemyPhase,
}

impl Enemy {
    pub(crate) fn phase(&self) -> EnemyPhase {
        self.phase
    }

    pub(crate) fn is_active(&self) -> bool {
        self.phase == EnemyPhase::Patrolling
    }

    pub(crate) fn is_flashing(&self, now: f64) -> bool {
        now < self.hit_flash_until
    }

    /// Chooses the walking direction before physics runs. Checks run in a
    /// fixed order so the last matching rule wins.
    pub(crate) fn patrol(&mut self, solids: &SolidLayer) {
        if !self.is_active() {
            return;
        }

        if self.body.blocked.left {
            self.direction = 1.0;
        }
        if self.body.blocked.right {
            self.direction = -1.0;
        }
        if self.body.x >= self.max_x {
            self.direction = -1.0;
        }
        if self.body.x <= self.min_x {
            self.direction = 1.0;
        }

        if self.body.grounded() {
            let ahead_x = self.body.x + self.direction * (self.body.half_width() + LEDGE_PROBE_AHEAD);
            let below_y = self.body.bottom() + LEDGE_PROBE_BELOW;
            if !solids.is_solid_at(ahead_x, below_y) {
                self.direction = -self.direction;
            }
        }

        self.body.vx = self.speed * self.direction;
    }

    /// Keeps the body inside its patrol range after integration.
    pub(crate) fn clamp_to_patrol(&mut self) {
        if self.is_active() {
            self.body.x = self.body.x.clamp(self.min_x, self.max_x);
        }
    }

    pub(crate) fn take_damage(
        &mut self,
        amount: u32,
        knockback_dir: f32,
        now: f64,
        tuning: &Tuning,
    ) -> EnemyDamage {
        if !self.is_active() || now < self.hit_invulnerable_until {
            return EnemyDamage::Rejected;
        }

        self.hit_invulnerable_until = now + tuning.enemy_hit_invulnerability_ms;
        self.hit_flash_until = now + tuning.enemy_hit_flash_ms;
        self.hp = self.hp.saturating_sub(amount);

        if knockback_dir != 0.0 {
            self.body.vx = knockback_dir.signum() * tuning.enemy_knockback_x;
            self.body.vy = -tuning.enemy_knockback_y;
        }

        if self.hp == 0 {
            self.die();
            return EnemyDamage::Killed;
        }
        EnemyDamage::Hurt { hp: self.hp }
    }

    /// Returns `true` only for the call that started dying.
    pub(crate) fn die(&mut self) -> bool {
        if self.phase != EnemyPhase::Patrolling {
            return false;
        }
        self.phase = EnemyPhase::Dying;
        debug!(enemy = self.runtime_id, spawn = %self.spawn_id, "enemy_dying");
        self.body.vx = 0.0;
        self.body.vy = 0.0;
        true
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.phase = EnemyPhase::Destroyed;
    }
}

/// Placement request handed to an [`EnemyFactory`]. Coordinates are pixels,
/// `y` is where the feet go.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EnemyRequest<'a> {
    pub(crate) spawn_id: &'a str,
    pub(crate) archetype: &'a str,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) patrol_min_x: f32,
    pub(crate) patrol_max_x: f32,
}

/// Builds enemies for the room loader so archetype specifics stay out of it.
pub(crate) trait EnemyFactory {
    fn create_enemy(&mut self, request: &EnemyRequest<'_>) -> Enemy;
}

#[derive(Debug, Clone)]
pub(crate) struct CrawlerFactory {
    speed: f32,
    max_hp: u32,
    contact_damage: u32,
    next_runtime_id: u64,
}

impl CrawlerFactory {
    pub(crate) fn new(tuning: &Tuning) -> Self {
        Self {
            speed: tuning.enemy_speed,
            max_hp: tuning.enemy_max_hp,
            contact_damage: tuning.enemy_contact_damage,
            next_runtime_id: 1,
        }
    }
}

impl EnemyFactory for CrawlerFactory {
    fn create_enemy(&mut self, request: &EnemyRequest<'_>) -> Enemy {
        if request.archetype != CRAWLER_ARCHETYPE {
            warn!(
                spawn = request.spawn_id,
                archetype = request.archetype,
                "unknown_enemy_archetype"
            );
        }
        let hitbox = feet_aligned_hitbox(
            CRAWLER_FRAME.0,
            CRAWLER_FRAME.1,
            CRAWLER_SCALE,
            CRAWLER_HITBOX.0,
            CRAWLER_HITBOX.1,
        );
        let runtime_id = self.next_runtime_id;
        self.next_runtime_id += 1;

        Enemy {
            runtime_id,
            spawn_id: request.spawn_id.to_string(),
            body: Body::new(request.x, request.y, hitbox.world_width, hitbox.world_height),
            min_x: request.patrol_min_x,
            max_x: request.patrol_max_x,
            direction: 1.0,
            speed: self.speed,
            hp: self.max_hp,
            damage_to_player: self.contact_damage.max(1),
            hit_invulnerable_until: 0.0,
            hit_flash_until: 0.0,
            phase: EnemyPhase::Patrolling,
        }
    }
}
