use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use winit::event::{ElementState, KeyboardInput, VirtualKeyCode};

/// Held keys, fed from window events and polled by scenes once per frame.
#[derive(Debug, Default)]
pub struct KeyState {
    current: HashSet<VirtualKeyCode>,
    previous: HashSet<VirtualKeyCode>,
}

impl KeyState {
    pub fn handle(&mut self, input: KeyboardInput) {
        if let Some(key) = input.virtual_keycode {
            self.set(key, input.state == ElementState::Pressed);
        }
    }

    pub fn set(&mut self, key: VirtualKeyCode, pressed: bool) {
        if pressed {
            self.current.insert(key);
        } else {
            self.current.remove(&key);
        }
    }

    pub fn is_pressed(&self, key: VirtualKeyCode) -> bool {
        self.current.contains(&key)
    }

    /// Down now but not at the previous [`KeyState::end_frame`].
    pub fn just_pressed(&self, key: VirtualKeyCode) -> bool {
        self.current.contains(&key) && !self.previous.contains(&key)
    }

    pub fn end_frame(&mut self) {
        self.previous.clone_from(&self.current);
    }

    /// Dropped when the window loses focus, so no key stays stuck down.
    pub fn release_all(&mut self) {
        self.current.clear();
    }
}

///
/// Rejects repeat triggers inside `window`. Unlike sleeping after a toggle,
/// the frame loop keeps running while the key is held.
///
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Debounce {
        Debounce { window, last: None }
    }

    pub fn trigger(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_held_keys() {
        let mut keys = KeyState::default();
        keys.set(VirtualKeyCode::Q, true);
        assert!(keys.is_pressed(VirtualKeyCode::Q));
        assert!(!keys.is_pressed(VirtualKeyCode::E));

        keys.set(VirtualKeyCode::Q, false);
        assert!(!keys.is_pressed(VirtualKeyCode::Q));
    }

    #[test]
    fn just_pressed_fires_once_per_press() {
        let mut keys = KeyState::default();
        keys.set(VirtualKeyCode::Tab, true);
        assert!(keys.just_pressed(VirtualKeyCode::Tab));
        keys.end_frame();
        assert!(!keys.just_pressed(VirtualKeyCode::Tab));
        assert!(keys.is_pressed(VirtualKeyCode::Tab));

        keys.set(VirtualKeyCode::Tab, false);
        keys.end_frame();
        keys.set(VirtualKeyCode::Tab, true);
        assert!(keys.just_pressed(VirtualKeyCode::Tab));
    }

    #[test]
    fn release_all_clears_held_keys() {
        let mut keys = KeyState::default();
        keys.set(VirtualKeyCode::Left, true);
        keys.set(VirtualKeyCode::Up, true);
        keys.release_all();
        assert!(!keys.is_pressed(VirtualKeyCode::Left));
        assert!(!keys.is_pressed(VirtualKeyCode::Up));
    }

    #[test]
    fn debounce_ignores_repeats_inside_window() {
        let start = Instant::now();
        let mut debounce = Debounce::new(Duration::from_millis(250));

        assert!(debounce.trigger(start));
        assert!(!debounce.trigger(start + Duration::from_millis(100)));
        assert!(!debounce.trigger(start + Duration::from_millis(249)));
        assert!(debounce.trigger(start + Duration::from_millis(250)));
        assert!(!debounce.trigger(start + Duration::from_millis(300)));
    }
}
