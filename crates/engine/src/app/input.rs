#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Jump,
    Fire,
    Dash,
    ToggleGroundSnap,
    Quit,
}

const ACTION_COUNT: usize = 9;

/// Level state plus a per-snapshot "went down this frame" edge for every action.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
    pressed: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        let index = action.index();
        if is_down && !self.down[index] {
            self.pressed[index] = true;
        }
        self.down[index] = is_down;
    }

    pub(crate) fn set_pressed(&mut self, action: InputAction, pressed: bool) {
        self.pressed[action.index()] = pressed;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn just_pressed(&self, action: InputAction) -> bool {
        self.pressed[action.index()]
    }

    pub(crate) fn clear_edges(&mut self) {
        self.pressed = [false; ACTION_COUNT];
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Jump => 4,
            InputAction::Fire => 5,
            InputAction::Dash => 6,
            InputAction::ToggleGroundSnap => 7,
            InputAction::Quit => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_fires_once_until_cleared() {
        let mut states = ActionStates::default();
        states.set(InputAction::Dash, true);
        assert!(states.is_down(InputAction::Dash));
        assert!(states.just_pressed(InputAction::Dash));

        states.clear_edges();
        states.set(InputAction::Dash, true);
        assert!(states.is_down(InputAction::Dash));
        assert!(!states.just_pressed(InputAction::Dash));
    }

    #[test]
    fn release_does_not_produce_edge() {
        let mut states = ActionStates::default();
        states.set(InputAction::Jump, false);
        assert!(!states.just_pressed(InputAction::Jump));
    }
}
