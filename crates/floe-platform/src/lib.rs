// SPDX-License-Identifier: CEPL-1.0
//! Window capability consumed by the renderer and the application loop.
//!
//! The renderer only ever sees the raw-window-handle traits plus a pixel size;
//! everything platform specific stays behind [`Window`].

mod input;

pub use input::InputState;

use floe_core::{Event, MouseButton};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window as WinitHandle, WindowId},
};

// Pumps allowed while waiting for the platform to hand us a window.
const CREATE_PUMP_ATTEMPTS: usize = 200;
const CREATE_PUMP_TIMEOUT: Duration = Duration::from_millis(5);
// Blocking pump used while minimized so the loop does not spin.
const IDLE_PUMP_TIMEOUT: Duration = Duration::from_millis(16);

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to create the event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create the window: {0}")]
    Os(#[from] winit::error::OsError),
    #[error("the platform never delivered a window")]
    NoWindow,
}

/// What the engine needs from a native window.
pub trait Window: HasWindowHandle + HasDisplayHandle {
    fn create(width: u32, height: u32, title: &str) -> Result<Self, PlatformError>
    where
        Self: Sized;

    /// Current drawable size in physical pixels. `(0, 0)` while minimized.
    fn size(&self) -> (u32, u32);
    fn should_close(&self) -> bool;
    /// Pumps pending platform events and updates the close/resize state.
    fn poll_events(&mut self);
    /// Events translated during the last [`Window::poll_events`] calls.
    fn drain_events(&mut self) -> Vec<Event>;
    /// Keyboard and mouse state as of the last [`Window::poll_events`].
    fn input(&self) -> &InputState;
}

struct WindowState {
    title: String,
    requested: PhysicalSize<u32>,
    window: Option<WinitHandle>,
    create_error: Option<winit::error::OsError>,
    size: PhysicalSize<u32>,
    close_requested: bool,
    events: Vec<Event>,
    input: InputState,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = WinitHandle::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(self.requested);
        match event_loop.create_window(attrs) {
            Ok(window) => {
                self.size = window.inner_size();
                info!(
                    "window `{}` created ({}x{})",
                    self.title, self.size.width, self.size.height
                );
                self.window = Some(window);
            }
            Err(e) => self.create_error = Some(e),
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match &event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Resized → {}x{}", size.width, size.height);
                self.size = *size;
            }
            _ => {}
        }

        let first = self.events.len();
        translate(&event, &mut self.events);
        for e in &self.events[first..] {
            self.input.apply(e);
        }
    }
}

/// Maps a winit window event onto the engine's event model, appending zero or
/// more events to `out`.
fn translate(event: &WindowEvent, out: &mut Vec<Event>) {
    match event {
        WindowEvent::CloseRequested => out.push(Event::WindowClose),
        WindowEvent::Resized(size) => out.push(Event::WindowResize {
            width: size.width,
            height: size.height,
        }),
        WindowEvent::Focused(focused) => out.push(Event::WindowFocus(*focused)),
        WindowEvent::KeyboardInput { event, .. } => {
            let key = match event.physical_key {
                PhysicalKey::Code(code) => format!("{code:?}"),
                PhysicalKey::Unidentified(native) => format!("{native:?}"),
            };
            translate_key(key, event.state, event.repeat, event.text.as_deref(), out);
        }
        WindowEvent::CursorMoved { position, .. } => out.push(Event::MouseMoved {
            x: position.x,
            y: position.y,
        }),
        WindowEvent::MouseWheel { delta, .. } => {
            let (dx, dy) = match delta {
                MouseScrollDelta::LineDelta(x, y) => (*x, *y),
                MouseScrollDelta::PixelDelta(p) => (p.x as f32, p.y as f32),
            };
            out.push(Event::MouseScrolled { dx, dy });
        }
        WindowEvent::MouseInput { state, button, .. } => {
            let button = translate_button(*button);
            out.push(match state {
                ElementState::Pressed => Event::MouseButtonPressed(button),
                ElementState::Released => Event::MouseButtonReleased(button),
            });
        }
        _ => {}
    }
}

/// A press is followed by one `KeyTyped` per character it produced.
fn translate_key(
    key: String,
    state: ElementState,
    repeat: bool,
    text: Option<&str>,
    out: &mut Vec<Event>,
) {
    match state {
        ElementState::Pressed => {
            out.push(Event::KeyPressed { key, repeat });
            out.extend(
                text.unwrap_or_default()
                    .chars()
                    .filter(|c| !c.is_control())
                    .map(Event::KeyTyped),
            );
        }
        ElementState::Released => out.push(Event::KeyReleased { key }),
    }
}

fn translate_button(button: winit::event::MouseButton) -> MouseButton {
    use winit::event::MouseButton as W;
    match button {
        W::Left => MouseButton::Left,
        W::Right => MouseButton::Right,
        W::Middle => MouseButton::Middle,
        W::Back => MouseButton::Back,
        W::Forward => MouseButton::Forward,
        W::Other(n) => MouseButton::Other(n),
    }
}

/// winit-backed window driven by explicit event pumping.
pub struct WinitWindow {
    event_loop: EventLoop<()>,
    state: WindowState,
    exited: bool,
}

impl WinitWindow {
    fn handle(&self) -> Result<&WinitHandle, HandleError> {
        self.state.window.as_ref().ok_or(HandleError::Unavailable)
    }

    fn pump(&mut self, timeout: Duration) {
        if self.exited {
            return;
        }
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(timeout), &mut self.state)
        {
            info!("event loop exited with code {code}");
            self.exited = true;
        }
    }
}

impl Window for WinitWindow {
    fn create(width: u32, height: u32, title: &str) -> Result<Self, PlatformError> {
        let event_loop = EventLoop::new()?;
        let mut window = WinitWindow {
            event_loop,
            state: WindowState {
                title: title.to_owned(),
                requested: PhysicalSize::new(width.max(1), height.max(1)),
                window: None,
                create_error: None,
                size: PhysicalSize::new(0, 0),
                close_requested: false,
                events: Vec::new(),
                input: InputState::new(),
            },
            exited: false,
        };

        // Windows can only be created from inside the running loop.
        for _ in 0..CREATE_PUMP_ATTEMPTS {
            window.pump(CREATE_PUMP_TIMEOUT);
            if let Some(e) = window.state.create_error.take() {
                return Err(e.into());
            }
            if window.state.window.is_some() {
                return Ok(window);
            }
            if window.exited {
                break;
            }
        }
        warn!("no window after {CREATE_PUMP_ATTEMPTS} pumps");
        Err(PlatformError::NoWindow)
    }

    fn size(&self) -> (u32, u32) {
        match &self.state.window {
            Some(w) => {
                let s = w.inner_size();
                (s.width, s.height)
            }
            None => (self.state.size.width, self.state.size.height),
        }
    }

    fn should_close(&self) -> bool {
        self.exited || self.state.close_requested
    }

    fn poll_events(&mut self) {
        let (w, h) = self.size();
        let timeout = if w == 0 || h == 0 {
            IDLE_PUMP_TIMEOUT
        } else {
            Duration::ZERO
        };
        self.pump(timeout);
    }

    fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.state.events)
    }

    fn input(&self) -> &InputState {
        &self.state.input
    }
}

impl HasWindowHandle for WinitWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.handle()?.window_handle()
    }
}

impl HasDisplayHandle for WinitWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.handle()?.display_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translated(event: WindowEvent) -> Vec<Event> {
        let mut out = Vec::new();
        translate(&event, &mut out);
        out
    }

    #[test]
    fn resize_and_close_translate() {
        assert_eq!(
            translated(WindowEvent::Resized(PhysicalSize::new(640, 480))),
            [Event::WindowResize {
                width: 640,
                height: 480
            }]
        );
        assert_eq!(translated(WindowEvent::CloseRequested), [Event::WindowClose]);
        assert_eq!(
            translated(WindowEvent::Focused(false)),
            [Event::WindowFocus(false)]
        );
        assert!(translated(WindowEvent::RedrawRequested).is_empty());
    }

    #[test]
    fn key_press_also_emits_typed_characters() {
        let mut out = Vec::new();
        translate_key("KeyA".to_owned(), ElementState::Pressed, false, Some("a"), &mut out);
        translate_key("Enter".to_owned(), ElementState::Pressed, false, Some("\r"), &mut out);
        translate_key("KeyA".to_owned(), ElementState::Released, false, None, &mut out);
        assert_eq!(
            out,
            [
                Event::KeyPressed {
                    key: "KeyA".to_owned(),
                    repeat: false
                },
                Event::KeyTyped('a'),
                Event::KeyPressed {
                    key: "Enter".to_owned(),
                    repeat: false
                },
                Event::KeyReleased {
                    key: "KeyA".to_owned()
                },
            ]
        );
    }

    #[test]
    fn repeated_press_types_again() {
        let mut out = Vec::new();
        translate_key("KeyX".to_owned(), ElementState::Pressed, true, Some("xX"), &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1..], [Event::KeyTyped('x'), Event::KeyTyped('X')]);
    }

    #[test]
    fn buttons_keep_their_identity() {
        assert_eq!(
            translate_button(winit::event::MouseButton::Other(7)),
            MouseButton::Other(7)
        );
        assert_eq!(
            translate_button(winit::event::MouseButton::Left),
            MouseButton::Left
        );
    }
}
