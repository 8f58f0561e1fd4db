//! Uniform block contents, laid out to match the std140 blocks in `src/shaders/`.

use bytemuck::{Pod, Zeroable};
use nalgebra_glm::{inverse_transpose, TMat4, TVec3};

use super::{lighting::Light, obj_loader::Material};

/// Depth pass, set 0 binding 0.
#[derive(Clone, Copy, Debug, Zeroable, Pod)]
#[repr(C)]
pub struct LightSpaceUniform {
    pub light_space: [[f32; 4]; 4],
}

/// Depth pass, set 1 binding 0.
#[derive(Clone, Copy, Debug, Zeroable, Pod)]
#[repr(C)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
}

/// Lit pass, set 0 binding 0. Visible to both stages.
#[derive(Clone, Copy, Debug, Zeroable, Pod)]
#[repr(C)]
pub struct FrameUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_space: [[f32; 4]; 4],
    pub light_position: [f32; 4],
    pub camera_position: [f32; 4],
    pub light_colour: [f32; 4],
    /// x: depth bias, y: ambient strength, z: specular strength.
    pub shading: [f32; 4],
}

/// Lit pass, set 1 binding 0.
#[derive(Clone, Copy, Debug, Zeroable, Pod)]
#[repr(C)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub shininess: f32,
    pub has_diffuse_map: u32,
    pub padding: [f32; 2],
}

#[derive(Debug, Clone, Copy)]
pub struct ShadingParams {
    pub bias: f32,
    pub ambient_strength: f32,
    pub specular_strength: f32,
}

fn extend(v: [f32; 3], w: f32) -> [f32; 4] {
    [v[0], v[1], v[2], w]
}

impl FrameUniform {
    pub fn new(
        view: &TMat4<f32>,
        projection: &TMat4<f32>,
        light_space: &TMat4<f32>,
        light: &Light,
        camera_position: &TVec3<f32>,
        shading: ShadingParams,
    ) -> FrameUniform {
        FrameUniform {
            view: (*view).into(),
            projection: (*projection).into(),
            light_space: (*light_space).into(),
            light_position: [light.position.x, light.position.y, light.position.z, 1.0],
            camera_position: [camera_position.x, camera_position.y, camera_position.z, 1.0],
            light_colour: extend(light.color, 1.0),
            shading: [
                shading.bias,
                shading.ambient_strength,
                shading.specular_strength,
                0.0,
            ],
        }
    }
}

impl ObjectUniform {
    pub fn new(model: &TMat4<f32>, material: &Material, has_diffuse_map: bool) -> ObjectUniform {
        ObjectUniform {
            model: (*model).into(),
            normal_matrix: inverse_transpose(*model).into(),
            ambient: extend(material.ambient, 1.0),
            diffuse: extend(material.diffuse, 1.0),
            specular: extend(material.specular, 1.0),
            shininess: material.specular_exponent(),
            has_diffuse_map: has_diffuse_map as u32,
            padding: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_glm::{identity, translate, vec3};

    #[test]
    fn blocks_have_std140_sizes() {
        assert_eq!(std::mem::size_of::<LightSpaceUniform>(), 64);
        assert_eq!(std::mem::size_of::<FrameUniform>(), 256);
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 192);
        assert_eq!(std::mem::offset_of!(ObjectUniform, shininess), 176);
        assert_eq!(std::mem::offset_of!(ObjectUniform, has_diffuse_map), 180);
    }

    #[test]
    fn unset_shininess_binds_default_exponent() {
        let material = Material {
            shininess: 0.0,
            ..Default::default()
        };
        let uniform = ObjectUniform::new(&identity(), &material, false);
        assert_eq!(uniform.shininess, 32.0);
        assert_eq!(uniform.has_diffuse_map, 0);

        let negative = Material {
            shininess: -1.0,
            ..Default::default()
        };
        assert_eq!(ObjectUniform::new(&identity(), &negative, true).shininess, 32.0);
    }

    #[test]
    fn normal_matrix_ignores_translation() {
        let model = translate(&identity(), &vec3(3.0, -2.0, 1.0));
        let uniform = ObjectUniform::new(&model, &Material::default(), true);
        // Upper 3x3 is untouched by a pure translation.
        for c in 0..3 {
            for r in 0..3 {
                let expected = if c == r { 1.0 } else { 0.0 };
                assert!((uniform.normal_matrix[c][r] - expected).abs() < 1e-6);
            }
        }
        assert_eq!(uniform.has_diffuse_map, 1);
    }
}
