use super::rooms::MAX_SUPPORTED_ROOMS;

const MAX_ERROR_CHARS: usize = 90;
const TRUNCATED_ERROR_CHARS: usize = 87;

/// Values the HUD shows; gathered fresh every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HudView<'a> {
    pub(crate) hp: u32,
    pub(crate) max_hp: u32,
    pub(crate) suit_level: u32,
    pub(crate) room_name: &'a str,
    pub(crate) can_dash: bool,
    pub(crate) missiles: u32,
    pub(crate) supers: u32,
    pub(crate) visited_rooms: usize,
    pub(crate) registered_rooms: usize,
}

/// Transient HUD state: the diagnostic line, the muzzle flash and the shot
/// counter. Text output goes to whatever displays it.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Hud {
    last_error: Option<String>,
    last_error_expires_at: f64,
    muzzle_flash_until: f64,
    shots: usize,
}

pub(crate) fn normalize_error(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return "Unknown error".to_string();
    }
    if normalized.chars().count() > MAX_ERROR_CHARS {
        let head: String = normalized.chars().take(TRUNCATED_ERROR_CHARS).collect();
        return format!("{head}...");
    }
    normalized
}

impl Hud {
    pub(crate) fn report_error(&mut self, text: &str, now: f64, show_ms: f64) {
        self.last_error = Some(normalize_error(text));
        self.last_error_expires_at = now + show_ms;
    }

    pub(crate) fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn flash_muzzle(&mut self, now: f64, show_ms: f64) {
        self.muzzle_flash_until = now + show_ms;
    }

    pub(crate) fn set_shots(&mut self, shots: usize) {
        self.shots = shots;
    }

    pub(crate) fn expire(&mut self, now: f64) {
        if self.last_error.is_some() && now > self.last_error_expires_at {
            self.last_error = None;
        }
    }

    pub(crate) fn lines(&self, view: &HudView<'_>, now: f64) -> Vec<String> {
        let mut lines = vec![
            format!(
                "HP: {}/{} | Suit: Mk{}",
                view.hp, view.max_hp, view.suit_level
            ),
            format!("Room: {}", view.room_name),
            if view.can_dash {
                "Dash: active (Shift)".to_string()
            } else {
                "Dash: locked".to_string()
            },
            format!(
                "Ammo -> Missile: {} | Super: {}",
                view.missiles, view.supers
            ),
            format!(
                "Map: {}/{} visited (up to {} rooms)",
                view.visited_rooms, view.registered_rooms, MAX_SUPPORTED_ROOMS
            ),
            format!("LastError: {}", self.last_error().unwrap_or("none")),
        ];
        if now < self.muzzle_flash_until {
            lines.push("PEW!".to_string());
        }
        lines.push(format!("Shots: {}", self.shots));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> HudView<'static> {
        HudView {
            hp: 4,
            max_hp: 6,
            suit_level: 2,
            room_name: "Entry Grotto",
            can_dash: false,
            missiles: 5,
            supers: 0,
            visited_rooms: 2,
            registered_rooms: 6,
        }
    }

    #[test]
    fn lines_show_player_and_progress() {
        let hud = Hud::default();
        let lines = hud.lines(&view(), 0.0);
        assert_eq!(lines[0], "HP: 4/6 | Suit: Mk2");
        assert_eq!(lines[1], "Room: Entry Grotto");
        assert_eq!(lines[2], "Dash: locked");
        assert_eq!(lines[3], "Ammo -> Missile: 5 | Super: 0");
        assert_eq!(lines[4], "Map: 2/6 visited (up to 50 rooms)");
        assert_eq!(lines[5], "LastError: none");
        assert_eq!(lines.last().map(String::as_str), Some("Shots: 0"));
    }

    #[test]
    fn errors_are_normalized_truncated_and_expire() {
        let mut hud = Hud::default();
        hud.report_error("  room   not\nfound ", 100.0, 2000.0);
        assert_eq!(hud.last_error(), Some("room not found"));

        hud.expire(2100.0);
        assert!(hud.last_error().is_some());
        hud.expire(2100.5);
        assert!(hud.last_error().is_none());

        let long = "x".repeat(120);
        let shortened = normalize_error(&long);
        assert_eq!(shortened.len(), 90);
        assert!(shortened.ends_with("..."));
        assert_eq!(normalize_error(" \t "), "Unknown error");
    }

    #[test]
    fn muzzle_flash_clears_after_its_window() {
        let mut hud = Hud::default();
        hud.flash_muzzle(0.0, 200.0);
        hud.set_shots(1);
        assert!(hud.lines(&view(), 199.0).join(" | ").contains("PEW!"));
        assert!(!hud.lines(&view(), 200.0).join(" | ").contains("PEW!"));
        assert!(hud.lines(&view(), 200.0).join(" | ").ends_with("Shots: 1"));
    }
}
