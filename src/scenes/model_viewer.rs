use std::{path::Path, time::Instant};

use log::info;

use crate::{
    config::DemoConfig,
    error::Result,
    input::KeyState,
    render_system::{
        camera::Camera,
        lighting::Light,
        model::SceneObject,
        obj_loader::{plane, Loader, Mesh},
        RenderSystem,
    },
};

use super::{ObjectControls, Scene, SceneFrame};

const FLOOR_MARGIN: f32 = 2.0;

/// An OBJ/MTL model standing on a floor sized to its footprint.
pub struct ModelViewerScene {
    name: String,
    camera: Camera,
    light: Light,
    objects: Vec<SceneObject>,
    controls: ObjectControls,
}

/// Lowest y and largest horizontal reach over every vertex, or `None` for no vertices.
pub fn footprint(meshes: &[Mesh]) -> Option<(f32, f32)> {
    meshes
        .iter()
        .flat_map(|mesh| mesh.positions.iter())
        .fold(None, |acc, p| {
            let reach = p[0].abs().max(p[2].abs());
            match acc {
                None => Some((p[1], reach)),
                Some((low, far)) => Some((low.min(p[1]), far.max(reach))),
            }
        })
}

impl ModelViewerScene {
    pub fn new(render_system: &mut RenderSystem, config: &DemoConfig, path: &Path) -> Result<Self> {
        let meshes = Loader::load(path)?;
        let (floor_y, reach) = footprint(&meshes).unwrap_or((0.0, 1.0));

        let model = SceneObject::new("model", render_system.upload_meshes(&meshes)?).build();
        let floor = SceneObject::new(
            "floor",
            render_system.upload_meshes(&[plane(reach + FLOOR_MARGIN, floor_y)])?,
        )
        .build();

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        info!("Model scene '{name}' ready, floor at y = {floor_y}");

        Ok(ModelViewerScene {
            name,
            camera: Camera::from_config(&config.camera, config.width as f32 / config.height as f32),
            light: Light::from_config(&config.light),
            objects: vec![model, floor],
            controls: ObjectControls::new(vec![0]),
        })
    }
}

impl Scene for ModelViewerScene {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, keys: &KeyState, now: Instant, delta: f32) {
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
