// SPDX-License-Identifier: CEPL-1.0
//! Polled view of keyboard and mouse state, kept current from the translated
//! event stream.

use floe_core::{Event, MouseButton};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<String>,
    buttons: HashSet<MouseButton>,
    mouse: (f64, f64),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::KeyPressed { key, .. } => {
                self.keys.insert(key.clone());
            }
            Event::KeyReleased { key } => {
                self.keys.remove(key);
            }
            Event::MouseButtonPressed(button) => {
                self.buttons.insert(*button);
            }
            Event::MouseButtonReleased(button) => {
                self.buttons.remove(button);
            }
            Event::MouseMoved { x, y } => self.mouse = (*x, *y),
            // releases that happen while unfocused never reach us
            Event::WindowFocus(false) => {
                self.keys.clear();
                self.buttons.clear();
            }
            _ => {}
        }
    }

    /// `key` is a physical key code name such as `"KeyW"` or `"Escape"`.
    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn is_mouse_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    /// Last cursor position in physical pixels, relative to the window.
    pub fn mouse_position(&self) -> (f64, f64) {
        self.mouse
    }

    pub fn mouse_x(&self) -> f64 {
        self.mouse.0
    }

    pub fn mouse_y(&self) -> f64 {
        self.mouse.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: &str) -> Event {
        Event::KeyPressed {
            key: key.to_owned(),
            repeat: false,
        }
    }

    #[test]
    fn keys_follow_press_and_release() {
        let mut input = InputState::new();
        input.apply(&press("KeyW"));
        input.apply(&press("ShiftLeft"));
        assert!(input.is_key_pressed("KeyW"));

        input.apply(&Event::KeyReleased {
            key: "KeyW".to_owned(),
        });
        assert!(!input.is_key_pressed("KeyW"));
        assert!(input.is_key_pressed("ShiftLeft"));
    }

    #[test]
    fn buttons_and_cursor_are_tracked() {
        let mut input = InputState::new();
        input.apply(&Event::MouseButtonPressed(MouseButton::Right));
        input.apply(&Event::MouseMoved { x: 12.5, y: 40.0 });
        assert!(input.is_mouse_button_pressed(MouseButton::Right));
        assert!(!input.is_mouse_button_pressed(MouseButton::Left));
        assert_eq!(input.mouse_position(), (12.5, 40.0));
        assert_eq!((input.mouse_x(), input.mouse_y()), (12.5, 40.0));

        input.apply(&Event::MouseButtonReleased(MouseButton::Right));
        assert!(!input.is_mouse_button_pressed(MouseButton::Right));
    }

    #[test]
    fn losing_focus_releases_everything() {
        let mut input = InputState::new();
        input.apply(&press("Space"));
        input.apply(&Event::MouseButtonPressed(MouseButton::Left));
        input.apply(&Event::MouseMoved { x: 1.0, y: 2.0 });

        input.apply(&Event::WindowFocus(false));
        assert!(!input.is_key_pressed("Space"));
        assert!(!input.is_mouse_button_pressed(MouseButton::Left));
        assert_eq!(input.mouse_position(), (1.0, 2.0));
    }

    #[test]
    fn typed_characters_do_not_press_keys() {
        let mut input = InputState::new();
        input.apply(&Event::KeyTyped('w'));
        assert!(!input.is_key_pressed("w"));
    }
}
