use nalgebra_glm::{look_at, ortho, vec3, TMat4, TVec3};

use crate::config::LightConfig;

/// Box the light renders into during the depth pass, in light view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoVolume {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl OrthoVolume {
    pub fn symmetric(half_extent: f32, near: f32, far: f32) -> OrthoVolume {
        OrthoVolume {
            left: -half_extent,
            right: half_extent,
            bottom: -half_extent,
            top: half_extent,
            near,
            far,
        }
    }

    pub fn projection(&self) -> TMat4<f32> {
        ortho(self.left, self.right, self.bottom, self.top, self.near, self.far)
    }
}

///
/// The single shadow-casting light of a scene. Position, target and volume stay
/// fixed for the lifetime of the scene.
///
#[derive(Debug, Clone)]
pub struct Light {
    pub position: TVec3<f32>,
    pub target: TVec3<f32>,
    pub color: [f32; 3],
    pub volume: OrthoVolume,
}

impl Light {
    pub fn from_config(config: &LightConfig) -> Light {
        let [px, py, pz] = config.position;
        let [tx, ty, tz] = config.target;
        Light {
            position: vec3(px, py, pz),
            target: vec3(tx, ty, tz),
            color: config.color,
            volume: OrthoVolume::symmetric(config.half_extent, config.near, config.far),
        }
    }

    /// World up, or +Z when the light looks straight along the Y axis.
    pub fn up(&self) -> TVec3<f32> {
        let direction = self.target - self.position;
        let up = vec3(0.0, 1.0, 0.0);
        if direction.cross(&up).norm() <= 1e-6 * direction.norm().max(1.0) {
            vec3(0.0, 0.0, 1.0)
        } else {
            up
        }
    }

    pub fn view(&self) -> TMat4<f32> {
        look_at(&self.position, &self.target, &self.up())
    }

    /// `ortho * lookAt(position, target, up)`; depends on nothing but the light's fields.
    pub fn light_space_matrix(&self) -> TMat4<f32> {
        self.volume.projection() * self.view()
    }
}
