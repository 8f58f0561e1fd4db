use nalgebra_glm::{look_at, perspective, vec3, TMat4, TVec3};

use crate::config::CameraConfig;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: TVec3<f32>,
    pub target: TVec3<f32>,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    aspect_ratio: f32,
}

impl Camera {
    pub fn from_config(config: &CameraConfig, aspect_ratio: f32) -> Camera {
        let [px, py, pz] = config.position;
        let [tx, ty, tz] = config.target;
        Camera {
            position: vec3(px, py, pz),
            target: vec3(tx, ty, tz),
            fov: config.fov.to_radians(),
            near: config.near,
            far: config.far,
            aspect_ratio,
        }
    }

    pub fn view(&self) -> TMat4<f32> {
        look_at(&self.position, &self.target, &vec3(0.0, 1.0, 0.0))
    }

    pub fn projection(&self) -> TMat4<f32> {
        perspective(self.aspect_ratio, self.fov, self.near, self.far)
    }

    /// Degenerate (minimised) extents leave the ratio unchanged.
    pub fn set_viewport_extent(&mut self, extent: [u32; 2]) {
        if extent[0] > 0 && extent[1] > 0 {
            self.aspect_ratio = extent[0] as f32 / extent[1] as f32;
        }
    }
}
