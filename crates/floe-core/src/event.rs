// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use std::fmt;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EventCategory: u8 {
        const APPLICATION  = 1 << 0;
        const INPUT        = 1 << 1;
        const KEYBOARD     = 1 << 2;
        const MOUSE        = 1 << 3;
        const MOUSE_BUTTON = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

/// Platform-neutral events produced by the window pump and consumed by layers.
///
/// Key names are the platform's physical key code names (`"KeyW"`,
/// `"Escape"`), which keeps this crate free of any windowing dependency.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    WindowClose,
    WindowResize { width: u32, height: u32 },
    WindowFocus(bool),
    KeyPressed { key: String, repeat: bool },
    KeyReleased { key: String },
    KeyTyped(char),
    MouseMoved { x: f64, y: f64 },
    MouseScrolled { dx: f32, dy: f32 },
    MouseButtonPressed(MouseButton),
    MouseButtonReleased(MouseButton),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::WindowClose => "WindowClose",
            Event::WindowResize { .. } => "WindowResize",
            Event::WindowFocus(_) => "WindowFocus",
            Event::KeyPressed { .. } => "KeyPressed",
            Event::KeyReleased { .. } => "KeyReleased",
            Event::KeyTyped(_) => "KeyTyped",
            Event::MouseMoved { .. } => "MouseMoved",
            Event::MouseScrolled { .. } => "MouseScrolled",
            Event::MouseButtonPressed(_) => "MouseButtonPressed",
            Event::MouseButtonReleased(_) => "MouseButtonReleased",
        }
    }

    pub fn category(&self) -> EventCategory {
        match self {
            Event::WindowClose | Event::WindowResize { .. } | Event::WindowFocus(_) => {
                EventCategory::APPLICATION
            }
            Event::KeyPressed { .. } | Event::KeyReleased { .. } | Event::KeyTyped(_) => {
                EventCategory::INPUT | EventCategory::KEYBOARD
            }
            Event::MouseMoved { .. } | Event::MouseScrolled { .. } => {
                EventCategory::INPUT | EventCategory::MOUSE
            }
            Event::MouseButtonPressed(_) | Event::MouseButtonReleased(_) => {
                EventCategory::INPUT | EventCategory::MOUSE | EventCategory::MOUSE_BUTTON
            }
        }
    }

    #[inline]
    pub fn is_in_category(&self, category: EventCategory) -> bool {
        self.category().intersects(category)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::WindowResize { width, height } => write!(f, "WindowResize: {width}x{height}"),
            Event::WindowFocus(focused) => write!(f, "WindowFocus: {focused}"),
            Event::KeyPressed { key, repeat } => write!(f, "KeyPressed: {key} (repeat={repeat})"),
            Event::KeyReleased { key } => write!(f, "KeyReleased: {key}"),
            Event::KeyTyped(c) => write!(f, "KeyTyped: {c:?}"),
            Event::MouseMoved { x, y } => write!(f, "MouseMoved: {x:.1}, {y:.1}"),
            Event::MouseScrolled { dx, dy } => write!(f, "MouseScrolled: {dx:.2}, {dy:.2}"),
            Event::MouseButtonPressed(b) => write!(f, "MouseButtonPressed: {b:?}"),
            Event::MouseButtonReleased(b) => write!(f, "MouseButtonReleased: {b:?}"),
            Event::WindowClose => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_buttons_are_input_and_mouse() {
        let e = Event::MouseButtonPressed(MouseButton::Left);
        assert!(e.is_in_category(EventCategory::INPUT));
        assert!(e.is_in_category(EventCategory::MOUSE));
        assert!(e.is_in_category(EventCategory::MOUSE_BUTTON));
        assert!(!e.is_in_category(EventCategory::KEYBOARD));
    }

    #[test]
    fn window_events_are_application_only() {
        let e = Event::WindowResize {
            width: 800,
            height: 600,
        };
        assert_eq!(e.category(), EventCategory::APPLICATION);
        assert_eq!(e.to_string(), "WindowResize: 800x600");
    }
}
