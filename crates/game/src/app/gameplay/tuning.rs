use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub(crate) const TUNING_FILE_NAME: &str = "tuning.json";

/// Gameplay constants. Times are milliseconds, distances pixels, speeds pixels/second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Tuning {
    pub(crate) gravity: f32,
    pub(crate) max_fall_speed: f32,

    pub(crate) player_max_hp: u32,
    pub(crate) player_move_speed: f32,
    pub(crate) player_jump_speed: f32,
    pub(crate) player_invulnerability_ms: f64,
    pub(crate) player_flicker_ms: f64,
    pub(crate) player_flicker_period_ms: f64,
    pub(crate) player_flicker_alpha: f32,
    pub(crate) contact_knockback_x: f32,
    pub(crate) contact_knockback_y: f32,

    pub(crate) dash_speed: f32,
    pub(crate) dash_duration_ms: f64,
    pub(crate) dash_cooldown_ms: f64,

    pub(crate) shot_interval_ms: f64,
    pub(crate) bullet_speed: f32,
    pub(crate) bullet_lifespan_ms: f64,
    pub(crate) bullet_tile_grace_ms: f64,
    pub(crate) bullet_cull_margin: f32,
    pub(crate) bullet_damage: u32,

    pub(crate) enemy_speed: f32,
    pub(crate) enemy_max_hp: u32,
    pub(crate) enemy_contact_damage: u32,
    pub(crate) enemy_hit_invulnerability_ms: f64,
    pub(crate) enemy_hit_flash_ms: f64,
    pub(crate) enemy_knockback_x: f32,
    pub(crate) enemy_knockback_y: f32,
    pub(crate) enemy_contact_from_player: bool,
    pub(crate) enemy_contact_damage_from_player: u32,

    pub(crate) ground_snap_tolerance: f32,
    pub(crate) ground_snap_max_vy: f32,

    pub(crate) fade_out_ms: f64,
    pub(crate) fade_in_ms: f64,

    pub(crate) fall_out_margin: f32,
    pub(crate) fall_out_damage: u32,

    pub(crate) muzzle_flash_ms: f64,
    pub(crate) diagnostic_ms: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            gravity: 600.0,
            max_fall_speed: 600.0,

            player_max_hp: 6,
            player_move_speed: 125.0,
            player_jump_speed: 340.0,
            player_invulnerability_ms: 850.0,
            player_flicker_ms: 640.0,
            player_flicker_period_ms: 160.0,
            player_flicker_alpha: 0.35,
            contact_knockback_x: 150.0,
            contact_knockback_y: 150.0,

            dash_speed: 360.0,
            dash_duration_ms: 130.0,
            dash_cooldown_ms: 650.0,

            shot_interval_ms: 150.0,
            bullet_speed: 520.0,
            bullet_lifespan_ms: 450.0,
            bullet_tile_grace_ms: 40.0,
            bullet_cull_margin: 50.0,
            bullet_damage: 1,

            enemy_speed: 40.0,
            enemy_max_hp: 3,
            enemy_contact_damage: 1,
            enemy_hit_invulnerability_ms: 80.0,
            enemy_hit_flash_ms: 60.0,
            enemy_knockback_x: 90.0,
            enemy_knockback_y: 50.0,
            enemy_contact_from_player: false,
            enemy_contact_damage_from_player: 1,

            ground_snap_tolerance: 0.6,
            ground_snap_max_vy: 5.0,

            fade_out_ms: 160.0,
            fade_in_ms: 180.0,

            fall_out_margin: 60.0,
            fall_out_damage: 99,

            muzzle_flash_ms: 200.0,
            diagnostic_ms: 2000.0,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum TuningError {
    #[error("parse tuning json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub(crate) fn parse_tuning_json(raw: &str) -> Result<Tuning, TuningError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, Tuning>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        TuningError::Parse {
            path,
            source: error.into_inner(),
        }
    })
}

/// Missing file means defaults; a broken file is reported and also falls back to defaults.
pub(crate) fn load_tuning(path: &Path) -> Tuning {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "tuning_defaults");
            return Tuning::default();
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "tuning_read_failed");
            return Tuning::default();
        }
    };

    match parse_tuning_json(&raw) {
        Ok(tuning) => {
            info!(path = %path.display(), "tuning_loaded");
            tuning
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "tuning_invalid");
            Tuning::default()
        }
    }
}
