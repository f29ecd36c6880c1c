use engine::app::{InputAction, InputSnapshot};

use super::physics::{feet_aligned_hitbox, Body};
use super::progress::ProgressStore;
use super::tuning::Tuning;

pub(crate) const PLAYER_SCALE: f32 = 0.07;
pub(crate) const PLAYER_FRAME: (u32, u32) = (400, 700);
pub(crate) const PLAYER_KNEEL_FRAME: (u32, u32) = (400, 520);
pub(crate) const PLAYER_HITBOX_WIDTH: f32 = 26.0;
pub(crate) const PLAYER_HITBOX_STAND_HEIGHT: f32 = 44.0;
pub(crate) const PLAYER_HITBOX_CROUCH_HEIGHT: f32 = 30.0;

const SHOT_PAD: f32 = 6.0;
const STAND_SHOT_FRACTION: f32 = 0.55;
const CROUCH_SHOT_FRACTION: f32 = 0.5;
const SHOT_TOP_INSET: f32 = 4.0;
const SHOT_BOTTOM_INSET: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Facing {
    Left,
    Right,
}

impl Facing {
    pub(crate) fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

/// Logical input for one tick. Crouch and stand are edge triggered, like
/// jump, fire and dash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MoveIntent {
    pub(crate) move_x: i8,
    pub(crate) crouch: bool,
    pub(crate) stand: bool,
    pub(crate) jump: bool,
    pub(crate) dash: bool,
    pub(crate) fire: bool,
}

impl MoveIntent {
    pub(crate) fn from_input(input: &InputSnapshot) -> Self {
        let right = i8::from(input.is_down(InputAction::MoveRight));
        let left = i8::from(input.is_down(InputAction::MoveLeft));
        Self {
            move_x: right - left,
            crouch: input.just_pressed(InputAction::MoveDown),
            stand: input.just_pressed(InputAction::MoveUp),
            jump: input.just_pressed(InputAction::Jump),
            dash: input.just_pressed(InputAction::Dash),
            fire: input.just_pressed(InputAction::Fire),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DamageOutcome {
    NotApplied,
    Applied,
    /// Health ran out and was restored to max; the caller restarts the room.
    Died,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ShotSpawn {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) direction: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlayerState {
    pub(crate) hp: u32,
    pub(crate) max_hp: u32,
    pub(crate) invulnerable_until: f64,
    pub(crate) dash_until: f64,
    pub(crate) dash_cooldown_until: f64,
    pub(crate) facing: Facing,
    pub(crate) crouching: bool,
    pub(crate) can_dash: bool,
    pub(crate) flicker_started_at: f64,
    pub(crate) flicker_until: f64,
    pub(crate) last_shot_at: Option<f64>,
}

impl PlayerState {
    fn new(max_hp: u32) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            invulnerable_until: 0.0,
            dash_until: 0.0,
            dash_cooldown_until: 0.0,
            facing: Facing::Right,
            crouching: false,
            can_dash: false,
            flicker_started_at: 0.0,
            flicker_until: 0.0,
            last_shot_at: None,
        }
    }
}

/// The player outlives every room; the room loader only repositions it.
#[derive(Debug, Clone)]
pub(crate) struct Player {
    pub(crate) body: Body,
    pub(crate) state: PlayerState,
    stand_size: (f32, f32),
    crouch_size: (f32, f32),
}

impl Player {
    pub(crate) fn new(tuning: &Tuning) -> Self {
        let stand = feet_aligned_hitbox(
            PLAYER_FRAME.0,
            PLAYER_FRAME.1,
            PLAYER_SCALE,
            PLAYER_HITBOX_WIDTH,
            PLAYER_HITBOX_STAND_HEIGHT,
        );
        let crouch = feet_aligned_hitbox(
            PLAYER_KNEEL_FRAME.0,
            PLAYER_KNEEL_FRAME.1,
            PLAYER_SCALE,
            PLAYER_HITBOX_WIDTH,
            PLAYER_HITBOX_CROUCH_HEIGHT,
        );
        Self {
            body: Body::new(64.0, 64.0, stand.world_width, stand.world_height),
            state: PlayerState::new(tuning.player_max_hp),
            stand_size: (stand.world_width, stand.world_height),
            crouch_size: (crouch.world_width, crouch.world_height),
        }
    }

    pub(crate) fn refresh_capabilities(&mut self, progress: &ProgressStore) {
        self.state.can_dash = progress.has_dash();
    }

    pub(crate) fn is_dashing(&self, now: f64) -> bool {
        now < self.state.dash_until
    }

    pub(crate) fn enter_crouch(&mut self) {
        if self.state.crouching {
            return;
        }
        self.state.crouching = true;
        self.body.resize(self.crouch_size.0, self.crouch_size.1);
        self.body.vx = 0.0;
    }

    pub(crate) fn exit_crouch(&mut self) {
        if !self.state.crouching {
            return;
        }
        self.state.crouching = false;
        self.body.resize(self.stand_size.0, self.stand_size.1);
    }

    /// Sets velocities for this tick from input. Grounded state is the one
    /// reported by the previous physics step.
    pub(crate) fn apply_movement(&mut self, intent: &MoveIntent, now: f64, tuning: &Tuning) {
        let grounded = self.body.grounded();

        if !self.state.crouching && grounded && intent.crouch {
            self.enter_crouch();
        } else if self.state.crouching && intent.stand {
            self.exit_crouch();
        }

        if self.state.crouching {
            self.body.vx = 0.0;
        } else {
            self.body.vx = (f32::from(intent.move_x) * tuning.player_move_speed).round();
            match intent.move_x.signum() {
                -1 => self.state.facing = Facing::Left,
                1 => self.state.facing = Facing::Right,
                _ => {}
            }
        }

        if intent.jump {
            self.exit_crouch();
            if grounded {
                self.body.vy = -tuning.player_jump_speed;
            }
        }

        if intent.dash && self.state.can_dash && now >= self.state.dash_cooldown_until {
            self.exit_crouch();
            self.state.dash_until = now + tuning.dash_duration_ms;
            self.state.dash_cooldown_until = now + tuning.dash_cooldown_ms;
        }

        if self.is_dashing(now) {
            self.body.allow_gravity = false;
            self.body.vx = self.state.facing.sign() * tuning.dash_speed;
            self.body.vy = 0.0;
        } else {
            self.body.allow_gravity = true;
        }
    }

    /// Rejected inside the invulnerability window, which is never extended by
    /// a rejected hit.
    pub(crate) fn damage(&mut self, amount: u32, now: f64, tuning: &Tuning) -> DamageOutcome {
        if now < self.state.invulnerable_until {
            return DamageOutcome::NotApplied;
        }

        self.state.hp = self.state.hp.saturating_sub(amount);
        self.state.invulnerable_until = now + tuning.player_invulnerability_ms;
        self.state.flicker_started_at = now;
        self.state.flicker_until = now + tuning.player_flicker_ms;

        if self.state.hp == 0 {
            self.state.hp = self.state.max_hp;
            return DamageOutcome::Died;
        }
        DamageOutcome::Applied
    }

    pub(crate) fn knock_back_from(&mut self, source_x: f32, tuning: &Tuning) {
        let dir = if self.body.x < source_x { -1.0 } else { 1.0 };
        self.body.vx = dir * tuning.contact_knockback_x;
        self.body.vy = -tuning.contact_knockback_y;
    }

    pub(crate) fn shot_spawn(&self) -> ShotSpawn {
        let direction = self.state.facing.sign();
        let x = if direction > 0.0 {
            self.body.right() + SHOT_PAD
        } else {
            self.body.left() - SHOT_PAD
        };

        let fraction = if self.state.crouching {
            CROUCH_SHOT_FRACTION
        } else {
            STAND_SHOT_FRACTION
        };
        let top = self.body.top();
        let min_y = top + SHOT_TOP_INSET;
        let max_y = self.body.bottom() - SHOT_BOTTOM_INSET;
        let y = (top + self.body.height * fraction).clamp(min_y, max_y.max(min_y));

        ShotSpawn {
            x: x.round(),
            y: y.round(),
            direction,
        }
    }

    /// Rate limited; returns where the bullet should appear.
    pub(crate) fn try_fire(&mut self, now: f64, tuning: &Tuning) -> Option<ShotSpawn> {
        if let Some(last) = self.state.last_shot_at {
            if now < last + tuning.shot_interval_ms {
                return None;
            }
        }
        self.state.last_shot_at = Some(now);
        Some(self.shot_spawn())
    }

    pub(crate) fn alpha(&self, now: f64, tuning: &Tuning) -> f32 {
        if now >= self.state.flicker_until || tuning.player_flicker_period_ms <= 0.0 {
            return 1.0;
        }
        let elapsed = (now - self.state.flicker_started_at).max(0.0);
        let phase = elapsed % tuning.player_flicker_period_ms;
        if phase < tuning.player_flicker_period_ms / 2.0 {
            tuning.player_flicker_alpha
        } else {
            1.0
        }
    }
}
