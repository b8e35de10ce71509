use std::collections::HashSet;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Single authoritative holder of the current pointer state.
///
/// The window event loop writes it; the per-frame tick reads it. Both run
/// on the same event loop, the locks only keep the background loader from
/// observing torn values.
#[derive(Debug, Default)]
pub struct InputState {
    mouse_position: RwLock<Vec2>,
    mouse_buttons: RwLock<HashSet<MouseButton>>,
    scroll: RwLock<f32>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the latest pointer position in physical pixels.
    pub fn set_mouse_position(&self, position: Vec2) {
        *self.mouse_position.write() = position;
    }

    pub fn mouse_position(&self) -> Vec2 {
        *self.mouse_position.read()
    }

    /// Pointer position mapped to normalized device coordinates (x and y in
    /// [-1, 1], y up) for the given viewport size.
    pub fn pointer_ndc(&self, viewport: (u32, u32)) -> Option<Vec2> {
        let (width, height) = viewport;
        if width == 0 || height == 0 {
            return None;
        }
        let position = self.mouse_position();
        Some(Vec2::new(
            position.x / width as f32 * 2.0 - 1.0,
            1.0 - position.y / height as f32 * 2.0,
        ))
    }

    pub fn set_mouse_button_down(&self, button: MouseButton) {
        self.mouse_buttons.write().insert(button);
    }

    pub fn set_mouse_button_up(&self, button: MouseButton) {
        self.mouse_buttons.write().remove(&button);
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.read().contains(&button)
    }

    /// Accumulates scroll ticks until the next frame consumes them.
    pub fn add_scroll(&self, delta: f32) {
        *self.scroll.write() += delta;
    }

    pub fn take_scroll(&self) -> f32 {
        std::mem::take(&mut *self.scroll.write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_pointer_position() {
        let state = InputState::new();
        state.set_mouse_position(Vec2::new(320.0, 180.0));
        assert_eq!(state.mouse_position(), Vec2::new(320.0, 180.0));
    }

    #[test]
    fn pointer_ndc_maps_corners() {
        let state = InputState::new();
        state.set_mouse_position(Vec2::ZERO);
        assert_eq!(
            state.pointer_ndc((640, 360)),
            Some(Vec2::new(-1.0, 1.0))
        );
        state.set_mouse_position(Vec2::new(640.0, 360.0));
        assert_eq!(state.pointer_ndc((640, 360)), Some(Vec2::new(1.0, -1.0)));
        state.set_mouse_position(Vec2::new(320.0, 180.0));
        assert_eq!(state.pointer_ndc((640, 360)), Some(Vec2::ZERO));
    }

    #[test]
    fn degenerate_viewport_yields_no_coordinates() {
        let state = InputState::new();
        assert_eq!(state.pointer_ndc((0, 360)), None);
    }

    #[test]
    fn tracks_buttons_and_scroll() {
        let state = InputState::new();
        state.set_mouse_button_down(MouseButton::LEFT);
        assert!(state.is_mouse_button_down(MouseButton::LEFT));
        assert!(!state.is_mouse_button_down(MouseButton::RIGHT));
        state.set_mouse_button_up(MouseButton::LEFT);
        assert!(!state.is_mouse_button_down(MouseButton::LEFT));

        state.add_scroll(1.5);
        state.add_scroll(-0.5);
        assert_eq!(state.take_scroll(), 1.0);
        assert_eq!(state.take_scroll(), 0.0);
    }
}
