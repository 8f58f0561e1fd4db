use std::time::Instant;

use nalgebra_glm::vec3;

use crate::{
    config::DemoConfig,
    error::Result,
    input::KeyState,
    render_system::{
        camera::Camera,
        lighting::Light,
        model::{ProgramKind, SceneObject},
        obj_loader::{plane, unit_cube, Material},
        RenderSystem,
    },
};

use super::{ObjectControls, Scene, SceneFrame};

/// Floor sits flush with the bottom face of the unit cube.
pub const FLOOR_HEIGHT: f32 = -0.5;
pub const FLOOR_HALF_EXTENT: f32 = 5.0;
const MARKER_SCALE: f32 = 0.2;

/// A unit cube resting on a floor, lit by the demo light.
pub struct CubeScene {
    camera: Camera,
    light: Light,
    objects: Vec<SceneObject>,
    controls: ObjectControls,
}

impl CubeScene {
    pub fn new(render_system: &mut RenderSystem, config: &DemoConfig) -> Result<CubeScene> {
        let light = Light::from_config(&config.light);
        let aspect = config.width as f32 / config.height as f32;

        let cube = SceneObject::new("cube", render_system.upload_meshes(&[unit_cube()])?).build();

        let floor = SceneObject::new(
            "floor",
            render_system.upload_meshes(&[plane(FLOOR_HALF_EXTENT, FLOOR_HEIGHT)])?,
        )
        .build();

        let mut marker_mesh = unit_cube();
        marker_mesh.material = Material::coloured(light.color);
        let marker = SceneObject::new("light", render_system.upload_meshes(&[marker_mesh])?)
            .position(light.position)
            .uniform_scale_factor(MARKER_SCALE)
            .program(ProgramKind::Emissive)
            .casts_shadow(false)
            .build();

        Ok(CubeScene {
            camera: Camera::from_config(&config.camera, aspect),
            light,
            objects: vec![cube, floor, marker],
            controls: ObjectControls::new(vec![0]),
        })
    }

    /// Put the cube back where it started.
    fn reset(&mut self) {
        if let Some(cube) = self.objects.first_mut() {
            cube.transform.set_position(vec3(0.0, 0.0, 0.0));
            cube.transform.set_scale(vec3(1.0, 1.0, 1.0));
            cube.transform.set_yaw(0.0);
        }
    }
}

impl Scene for CubeScene {
    fn name(&self) -> &str {
        "cube"
    }

    fn update(&mut self, keys: &KeyState, now: Instant, delta: f32) {
        if keys.just_pressed(winit::event::VirtualKeyCode::R) {
            self.reset();
        }
        self.controls.apply(keys, now, delta, &mut self.objects);
    }

    fn frame(&mut self) -> SceneFrame<'_> {
        SceneFrame {
            camera: &mut self.camera,
            light: &self.light,
            objects: &mut self.objects,
        }
    }
}
