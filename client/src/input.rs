//! Keyboard and mouse sampling

use glam::Vec2;
use macroquad::prelude::{
    is_key_down, is_key_pressed, is_mouse_button_down, is_quit_requested, mouse_position,
    set_cursor_grab, show_mouse, KeyCode, MouseButton,
};
use shared::Actions;

/// Raw button state for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub hook: bool,
    pub left_mouse: bool,
    pub right_mouse: bool,
}

impl KeyState {
    pub fn to_actions(self) -> Actions {
        let mut actions = Actions::NONE;
        let bits = [
            (self.forward, Actions::FORWARD),
            (self.backward, Actions::BACKWARD),
            (self.left, Actions::LEFT),
            (self.right, Actions::RIGHT),
            (self.jump, Actions::JUMP),
            (self.hook, Actions::HOOK),
            (self.left_mouse, Actions::LEFT_MOUSE),
            (self.right_mouse, Actions::RIGHT_MOUSE),
        ];
        for (held, action) in bits {
            if held {
                actions |= action;
            }
        }
        actions
    }
}

/// One frame of player input
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSample {
    pub actions: Actions,
    /// Mouse movement in pixels since the previous sample
    pub mouse_changes: Vec2,
    pub quit: bool,
}

/// Turns macroquad's input state into [`InputSample`]s
pub struct InputManager {
    last_mouse: Option<Vec2>,
    grabbed: bool,
    started: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            last_mouse: None,
            grabbed: false,
            started: false,
        }
    }

    fn set_grab(&mut self, grabbed: bool) {
        self.grabbed = grabbed;
        set_cursor_grab(grabbed);
        show_mouse(!grabbed);
        self.last_mouse = None;
    }

    /// Samples the current frame. Tab releases and recaptures the cursor.
    pub fn update(&mut self) -> InputSample {
        if !self.started {
            self.started = true;
            self.set_grab(true);
        } else if is_key_pressed(KeyCode::Tab) {
            self.set_grab(!self.grabbed);
        }

        let (x, y) = mouse_position();
        let mouse = Vec2::new(x, y);
        let mouse_changes = match self.last_mouse {
            Some(last) if self.grabbed => mouse - last,
            _ => Vec2::ZERO,
        };
        self.last_mouse = Some(mouse);

        let keys = KeyState {
            forward: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            backward: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            jump: is_key_down(KeyCode::Space),
            hook: is_key_down(KeyCode::E),
            left_mouse: self.grabbed && is_mouse_button_down(MouseButton::Left),
            right_mouse: self.grabbed && is_mouse_button_down(MouseButton::Right),
        };

        InputSample {
            actions: keys.to_actions(),
            mouse_changes,
            quit: is_key_pressed(KeyCode::Escape) || is_quit_requested(),
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
