// SPDX-License-Identifier: CEPL-1.0
use glam::Vec2;
use std::collections::HashSet;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keyboard and mouse state for one window, current plus previous frame.
///
/// Fed from window events while pumping; [`InputState::end_frame`] rolls
/// the current tables into the previous ones once the frame consumed them.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    prev_keys: HashSet<KeyCode>,
    buttons: HashSet<MouseButton>,
    prev_buttons: HashSet<MouseButton>,
    cursor: Option<Vec2>,
    mouse_delta: Vec2,
}

impl InputState {
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.press_key(code),
                        ElementState::Released => self.release_key(code),
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.press_button(*button),
                ElementState::Released => self.release_button(*button),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            // Releases that happen while unfocused never reach us.
            WindowEvent::Focused(false) => self.clear(),
            _ => {}
        }
    }

    pub fn press_key(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn release_key(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn press_button(&mut self, button: MouseButton) {
        self.buttons.insert(button);
    }

    pub fn release_button(&mut self, button: MouseButton) {
        self.buttons.remove(&button);
    }

    pub fn cursor_moved(&mut self, pos: Vec2) {
        if let Some(last) = self.cursor {
            self.mouse_delta += pos - last;
        }
        self.cursor = Some(pos);
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.buttons.clear();
        self.mouse_delta = Vec2::ZERO;
    }

    pub fn end_frame(&mut self) {
        self.prev_keys.clone_from(&self.keys);
        self.prev_buttons.clone_from(&self.buttons);
        self.mouse_delta = Vec2::ZERO;
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys.contains(&key) && !self.prev_keys.contains(&key)
    }

    pub fn is_key_released(&self, key: KeyCode) -> bool {
        !self.keys.contains(&key) && self.prev_keys.contains(&key)
    }

    pub fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button) && !self.prev_buttons.contains(&button)
    }

    pub fn is_mouse_released(&self, button: MouseButton) -> bool {
        !self.buttons.contains(&button) && self.prev_buttons.contains(&button)
    }

    /// Cursor travel since the last `end_frame`, in physical pixels.
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    pub fn cursor_position(&self) -> Option<Vec2> {
        self.cursor
    }
}
