use std::time::{Duration, Instant};

use log::info;
use nalgebra_glm::vec3;
use winit::event::{ElementState, KeyboardInput, VirtualKeyCode};

use crate::{
    input::{Debounce, KeyState},
    render_system::{camera::Camera, lighting::Light, model::SceneObject},
};

pub mod cube;
pub mod model_viewer;

/// Units per second for arrow key movement.
const MOVE_SPEED: f32 = 2.0;
/// Radians per second for Q/E.
const TURN_SPEED: f32 = 1.5;
/// Scale multiplier per second for Z/X.
const SCALE_RATE: f32 = 1.5;
const MIN_SCALE: f32 = 0.05;
/// Idle spin of the selected object, 30 degrees per second.
const SPIN_SPEED: f32 = std::f32::consts::PI / 6.0;
const TOGGLE_DEBOUNCE: Duration = Duration::from_millis(250);

/// Borrowed view of everything a frame needs from a scene.
pub struct SceneFrame<'a> {
    pub camera: &'a mut Camera,
    pub light: &'a Light,
    pub objects: &'a mut [SceneObject],
}

pub trait Scene {
    fn name(&self) -> &str;
    fn update(&mut self, keys: &KeyState, now: Instant, delta: f32);
    fn frame(&mut self) -> SceneFrame<'_>;
}

///
/// Keyboard driven editing of a list of objects. Only indices in
/// `selectable` can be picked with Tab; the rest (floor, light marker) stay put.
///
#[derive(Debug)]
pub struct ObjectControls {
    selectable: Vec<usize>,
    cursor: usize,
    spin_direction: f32,
    spin_toggle: Debounce,
}

impl ObjectControls {
    pub fn new(selectable: Vec<usize>) -> ObjectControls {
        ObjectControls {
            selectable,
            cursor: 0,
            spin_direction: 1.0,
            spin_toggle: Debounce::new(TOGGLE_DEBOUNCE),
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selectable.get(self.cursor).copied()
    }

    pub fn apply(&mut self, keys: &KeyState, now: Instant, delta: f32, objects: &mut [SceneObject]) {
        if keys.just_pressed(VirtualKeyCode::Tab) && !self.selectable.is_empty() {
            self.cursor = (self.cursor + 1) % self.selectable.len();
            if let Some(object) = self.selected().and_then(|i| objects.get(i)) {
                let (position, scale) = (object.transform.position(), object.transform.scale_factors());
                info!(
                    "Selected {} at ({:.2}, {:.2}, {:.2}), yaw {:.2}, scale {:.2}",
                    object.name,
                    position.x,
                    position.y,
                    position.z,
                    object.transform.yaw(),
                    scale.x
                );
            }
        }

        if keys.is_pressed(VirtualKeyCode::Space) && self.spin_toggle.trigger(now) {
            self.spin_direction = -self.spin_direction;
        }

        let Some(object) = self.selected().and_then(|i| objects.get_mut(i)) else {
            return;
        };
        let transform = &mut object.transform;

        let step = MOVE_SPEED * delta;
        let mut movement = vec3(0.0, 0.0, 0.0);
        if keys.is_pressed(VirtualKeyCode::Left) {
            movement.x -= step;
        }
        if keys.is_pressed(VirtualKeyCode::Right) {
            movement.x += step;
        }
        if keys.is_pressed(VirtualKeyCode::Up) {
            movement.z -= step;
        }
        if keys.is_pressed(VirtualKeyCode::Down) {
            movement.z += step;
        }
        if movement != vec3(0.0, 0.0, 0.0) {
            transform.translate(movement);
        }

        let mut turn = SPIN_SPEED * self.spin_direction;
        if keys.is_pressed(VirtualKeyCode::Q) {
            turn += TURN_SPEED;
        }
        if keys.is_pressed(VirtualKeyCode::E) {
            turn -= TURN_SPEED;
        }
        transform.rotate(turn * delta);

        if keys.is_pressed(VirtualKeyCode::Z) {
            transform.scale_by(SCALE_RATE.powf(-delta), MIN_SCALE);
        }
        if keys.is_pressed(VirtualKeyCode::X) {
            transform.scale_by(SCALE_RATE.powf(delta), MIN_SCALE);
        }
    }
}

pub struct SceneManager {
    scenes: Vec<Box<dyn Scene>>,
    active_scene_index: u32,
}

impl SceneManager {
    pub fn new() -> Self {
        SceneManager {
            active_scene_index: 0,
            scenes: Vec::new(),
        }
    }

    pub fn add_scene(&mut self, scene: Box<dyn Scene>) {
        self.scenes.push(scene);
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn set_active(&mut self, index: u32) {
        if (index as usize) < self.scenes.len() && index != self.active_scene_index {
            self.active_scene_index = index;
            info!("Switched to scene '{}'", self.scenes[index as usize].name());
        }
    }

    /// Number keys 1..9 pick the scene with that position.
    pub fn switch_scene_by_key(&mut self, input: KeyboardInput) {
        if input.state != ElementState::Pressed {
            return;
        }

        if let Some(index) = input.virtual_keycode.and_then(scene_index_for_key) {
            self.set_active(index);
        }
    }

    pub fn active_scene(&mut self) -> Option<&mut dyn Scene> {
        match self.scenes.get_mut(self.active_scene_index as usize) {
            Some(scene) => Some(scene.as_mut()),
            None => None,
        }
    }
}

impl Default for SceneManager {
    fn default() -> Self {
        Self::new()
    }
}

fn scene_index_for_key(key: VirtualKeyCode) -> Option<u32> {
    let first = VirtualKeyCode::Key1 as u32;
    let last = VirtualKeyCode::Key9 as u32;
    let key = key as u32;
    (first..=last).contains(&key).then(|| key - first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CameraConfig, config::LightConfig, render_system::model::ProgramKind};

    struct Empty {
        camera: Camera,
        light: Light,
        objects: Vec<SceneObject>,
    }

    impl Empty {
        fn boxed() -> Box<dyn Scene> {
            Box::new(Empty {
                camera: Camera::from_config(&CameraConfig::default(), 1.5),
                light: Light::from_config(&LightConfig::default()),
                objects: Vec::new(),
            })
        }
    }

    impl Scene for Empty {
        fn name(&self) -> &str {
            "empty"
        }

        fn update(&mut self, _keys: &KeyState, _now: Instant, _delta: f32) {}

        fn frame(&mut self) -> SceneFrame<'_> {
            SceneFrame {
                camera: &mut self.camera,
                light: &self.light,
                objects: &mut self.objects,
            }
        }
    }

    fn objects(count: usize) -> Vec<SceneObject> {
        (0..count)
            .map(|i| SceneObject::new(&format!("object {i}"), Vec::new()).build())
            .collect()
    }

    #[test]
    fn number_keys_map_to_scene_slots() {
        assert_eq!(scene_index_for_key(VirtualKeyCode::Key1), Some(0));
        assert_eq!(scene_index_for_key(VirtualKeyCode::Key3), Some(2));
        assert_eq!(scene_index_for_key(VirtualKeyCode::Key9), Some(8));
        assert_eq!(scene_index_for_key(VirtualKeyCode::Key0), None);
        assert_eq!(scene_index_for_key(VirtualKeyCode::A), None);
    }

    #[test]
    fn out_of_range_scene_is_ignored() {
        let mut manager = SceneManager::new();
        manager.add_scene(Empty::boxed());
        manager.add_scene(Empty::boxed());

        manager.set_active(5);
        assert_eq!(manager.active_scene_index, 0);
        manager.set_active(1);
        assert_eq!(manager.active_scene_index, 1);
        assert!(manager.active_scene().is_some());
    }

    #[test]
    fn arrows_move_only_the_selected_object() {
        let mut objects = objects(3);
        let mut controls = ObjectControls::new(vec![1, 2]);
        let mut keys = KeyState::default();
        keys.set(VirtualKeyCode::Right, true);

        controls.apply(&keys, Instant::now(), 0.5, &mut objects);

        assert_eq!(objects[0].transform.position(), vec3(0.0, 0.0, 0.0));
        assert!((objects[1].transform.position().x - 1.0).abs() < 1e-6);
        assert_eq!(objects[2].transform.position(), vec3(0.0, 0.0, 0.0));
        assert_eq!(objects[1].program(), ProgramKind::Lit);
    }

    #[test]
    fn tab_cycles_selection() {
        let mut objects = objects(3);
        let mut controls = ObjectControls::new(vec![0, 2]);
        let mut keys = KeyState::default();
        let now = Instant::now();

        keys.set(VirtualKeyCode::Tab, true);
        controls.apply(&keys, now, 0.0, &mut objects);
        assert_eq!(controls.selected(), Some(2));

        // Still held: no second step.
        keys.end_frame();
        controls.apply(&keys, now, 0.0, &mut objects);
        assert_eq!(controls.selected(), Some(2));

        keys.set(VirtualKeyCode::Tab, false);
        keys.end_frame();
        keys.set(VirtualKeyCode::Tab, true);
        controls.apply(&keys, now, 0.0, &mut objects);
        assert_eq!(controls.selected(), Some(0));
    }

    #[test]
    fn held_space_flips_spin_once_per_window() {
        let mut objects = objects(1);
        let mut controls = ObjectControls::new(vec![0]);
        let mut keys = KeyState::default();
        keys.set(VirtualKeyCode::Space, true);
        let start = Instant::now();

        controls.apply(&keys, start, 0.0, &mut objects);
        assert_eq!(controls.spin_direction, -1.0);
        controls.apply(&keys, start + Duration::from_millis(50), 0.0, &mut objects);
        assert_eq!(controls.spin_direction, -1.0);
        controls.apply(&keys, start + Duration::from_millis(300), 0.0, &mut objects);
        assert_eq!(controls.spin_direction, 1.0);
    }

    #[test]
    fn scaling_never_collapses() {
        let mut objects = objects(1);
        let mut controls = ObjectControls::new(vec![0]);
        let mut keys = KeyState::default();
        keys.set(VirtualKeyCode::Z, true);

        for _ in 0..200 {
            controls.apply(&keys, Instant::now(), 0.1, &mut objects);
        }
        let scale = objects[0].transform.scale_factors();
        assert!((scale.x - MIN_SCALE).abs() < 1e-6);
    }
}
