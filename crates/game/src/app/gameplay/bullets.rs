use super::physics::Aabb;

pub(crate) const BULLET_WIDTH: f32 = 6.0;
pub(crate) const BULLET_HEIGHT: f32 = 3.0;

/// Horizontal projectile. Position is the centre; bullets ignore gravity.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Bullet {
    pub(crate) id: u64,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) vx: f32,
    pub(crate) spawned_at: f64,
    pub(crate) expires_at: f64,
    pub(crate) active: bool,
}

impl Bullet {
    pub(crate) fn aabb(&self) -> Aabb {
        Aabb::from_center(self.x, self.y, BULLET_WIDTH, BULLET_HEIGHT)
    }

    pub(crate) fn age(&self, now: f64) -> f64 {
        now - self.spawned_at
    }

    pub(crate) fn direction(&self) -> f32 {
        if self.vx < 0.0 {
            -1.0
        } else {
            1.0
        }
    }
}

/// Owns every live bullet. Survives room loads but is emptied by each one.
#[derive(Debug, Default)]
pub(crate) struct BulletPool {
    bullets: Vec<Bullet>,
    next_id: u64,
}

impl BulletPool {
    pub(crate) fn spawn(&mut self, x: f32, y: f32, vx: f32, now: f64, lifespan_ms: f64) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.bullets.push(Bullet {
            id,
            x,
            y,
            vx,
            spawned_at: now,
            expires_at: now + lifespan_ms,
            active: true,
        });
        id
    }

    pub(crate) fn advance(&mut self, dt: f32) {
        for bullet in self.bullets.iter_mut().filter(|bullet| bullet.active) {
            bullet.x += bullet.vx * dt;
        }
    }

    /// Returns whether the bullet was still active.
    pub(crate) fn deactivate(&mut self, id: u64) -> bool {
        match self.bullets.iter_mut().find(|bullet| bullet.id == id) {
            Some(bullet) if bullet.active => {
                bullet.active = false;
                true
            }
            _ => false,
        }
    }

    /// Drops inactive bullets, expired ones, and those beyond the horizontal
    /// cull bounds. Returns how many live bullets were culled.
    pub(crate) fn retire(&mut self, now: f64, left: f32, right: f32) -> usize {
        let before_live = self.active_count();
        self.bullets.retain(|bullet| {
            bullet.active && now < bullet.expires_at && bullet.x >= left && bullet.x <= right
        });
        before_live - self.bullets.len()
    }

    pub(crate) fn clear(&mut self) {
        self.bullets.clear();
    }

    pub(crate) fn active(&self) -> impl Iterator<Item = &Bullet> {
        self.bullets.iter().filter(|bullet| bullet.active)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullets_move_horizontally_only() {
        let mut pool = BulletPool::default();
        pool.spawn(10.0, 20.0, 520.0, 0.0, 450.0);
        pool.advance(0.5);
        let bullet = pool.active().next().expect("bullet");
        assert_eq!((bullet.x, bullet.y), (270.0, 20.0));
    }

    #[test]
    fn retire_drops_expired_offscreen_and_hit_bullets() {
        let mut pool = BulletPool::default();
        let expired = pool.spawn(50.0, 0.0, 0.0, 0.0, 100.0);
        let _left = pool.spawn(-60.0, 0.0, 0.0, 200.0, 450.0);
        let hit = pool.spawn(60.0, 0.0, 0.0, 200.0, 450.0);
        let alive = pool.spawn(70.0, 0.0, 0.0, 200.0, 450.0);

        assert!(pool.deactivate(hit));
        assert!(!pool.deactivate(hit));
        assert_eq!(pool.retire(250.0, -50.0, 500.0), 2);
        let ids: Vec<u64> = pool.active().map(|bullet| bullet.id).collect();
        assert_eq!(ids, vec![alive]);
        assert!(!pool.deactivate(expired));
    }
}
