//! CPU rendition of the shadow test performed by `lit.frag`, plus a small depth
//! rasterizer that fills a [`DepthMap`] the same way the depth pass fills the
//! shadow image. Both use the GL clip convention the shaders remap from.

use nalgebra_glm::{vec3, vec4, TMat4, TVec3};

use crate::render_system::obj_loader::Mesh;

/// Depth values cleared to 1.0 (far plane), sampled with nearest filtering.
#[derive(Debug, Clone)]
pub struct DepthMap {
    width: u32,
    height: u32,
    depths: Vec<f32>,
}

/// Light-space position remapped from [-1,1] to [0,1] on every axis.
pub fn project_to_shadow_map(light_space: &TMat4<f32>, world: &TVec3<f32>) -> TVec3<f32> {
    let clip = light_space * vec4(world.x, world.y, world.z, 1.0);
    let ndc = vec3(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w);
    ndc * 0.5 + vec3(0.5, 0.5, 0.5)
}

///
/// 1.0 when the fragment at `coords` is occluded, 0.0 otherwise.
/// Anything outside the map on x/y, or beyond the far plane, counts as lit.
///
pub fn shadow_factor(map: &DepthMap, coords: &TVec3<f32>, bias: f32) -> f32 {
    let outside = coords.x < 0.0
        || coords.x > 1.0
        || coords.y < 0.0
        || coords.y > 1.0
        || coords.z > 1.0;
    if outside {
        return 0.0;
    }

    let closest = map.sample(coords.x, coords.y);
    if coords.z - bias > closest {
        1.0
    } else {
        0.0
    }
}

impl DepthMap {
    pub fn new(width: u32, height: u32) -> DepthMap {
        DepthMap {
            width,
            height,
            depths: vec![1.0; (width * height) as usize],
        }
    }

    pub fn clear(&mut self) {
        self.depths.iter_mut().for_each(|d| *d = 1.0);
    }

    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.depths[(y * self.width + x) as usize]
    }

    pub fn rasterize_mesh(&mut self, light_space: &TMat4<f32>, model: &TMat4<f32>, mesh: &Mesh) {
        let transform = light_space * model;
        let projected: Vec<TVec3<f32>> = mesh
            .positions
            .iter()
            .map(|p| project_to_shadow_map(&transform, &vec3(p[0], p[1], p[2])))
            .collect();

        if mesh.indices.is_empty() {
            for tri in projected.chunks_exact(3) {
                self.rasterize_triangle([tri[0], tri[1], tri[2]]);
            }
        } else {
            for tri in mesh.indices.chunks_exact(3) {
                self.rasterize_triangle([
                    projected[tri[0] as usize],
                    projected[tri[1] as usize],
                    projected[tri[2] as usize],
                ]);
            }
        }
    }

    /// Keeps the nearest depth at every texel centre covered by the triangle.
    fn rasterize_triangle(&mut self, tri: [TVec3<f32>; 3]) {
        let (w, h) = (self.width as f32, self.height as f32);
        let pts: Vec<(f32, f32, f32)> = tri.iter().map(|p| (p.x * w, p.y * h, p.z)).collect();
        let (a, b, c) = (pts[0], pts[1], pts[2]);

        let area = edge(a, b, c.0, c.1);
        if area.abs() <= f32::EPSILON {
            return;
        }

        let min_x = a.0.min(b.0).min(c.0).floor().max(0.0) as u32;
        let max_x = a.0.max(b.0).max(c.0).ceil().min(w) as u32;
        let min_y = a.1.min(b.1).min(c.1).floor().max(0.0) as u32;
        let max_y = a.1.max(b.1).max(c.1).ceil().min(h) as u32;

        for y in min_y..max_y {
            for x in min_x..max_x {
                let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(b, c, px, py) / area;
                let w1 = edge(c, a, px, py) / area;
                let w2 = edge(a, b, px, py) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * a.2 + w1 * b.2 + w2 * c.2;
                if !(0.0..=1.0).contains(&depth) {
                    continue;
                }

                let texel = &mut self.depths[(y * self.width + x) as usize];
                if depth < *texel {
                    *texel = depth;
                }
            }
        }
    }
}

fn edge(a: (f32, f32, f32), b: (f32, f32, f32), px: f32, py: f32) -> f32 {
    (b.0 - a.0) * (py - a.1) - (b.1 - a.1) * (px - a.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{LightConfig, SHADOW_BIAS},
        render_system::{
            lighting::Light,
            obj_loader::{plane, unit_cube},
        },
    };
    use nalgebra_glm::identity;

    fn demo_scene_map(size: u32) -> (Light, DepthMap) {
        let light = Light::from_config(&LightConfig::default());
        let light_space = light.light_space_matrix();
        let mut map = DepthMap::new(size, size);
        map.rasterize_mesh(&light_space, &identity(), &unit_cube());
        map.rasterize_mesh(&light_space, &identity(), &plane(5.0, -0.5));
        (light, map)
    }

    #[test]
    fn outside_map_is_never_shadowed() {
        let mut map = DepthMap::new(4, 4);
        map.depths.iter_mut().for_each(|d| *d = 0.0);

        for coords in [
            vec3(-0.1, 0.5, 0.9),
            vec3(1.1, 0.5, 0.9),
            vec3(0.5, -0.01, 0.9),
            vec3(0.5, 1.5, 0.9),
            vec3(0.5, 0.5, 1.2),
        ] {
            assert_eq!(shadow_factor(&map, &coords, SHADOW_BIAS), 0.0);
        }
        assert_eq!(shadow_factor(&map, &vec3(0.5, 0.5, 0.9), SHADOW_BIAS), 1.0);
    }

    #[test]
    fn bias_absorbs_small_depth_differences() {
        let mut map = DepthMap::new(1, 1);
        map.depths[0] = 0.5;
        assert_eq!(shadow_factor(&map, &vec3(0.5, 0.5, 0.504), 0.005), 0.0);
        assert_eq!(shadow_factor(&map, &vec3(0.5, 0.5, 0.506), 0.005), 1.0);
    }

    #[test]
    fn cleared_map_reads_far_plane() {
        let map = DepthMap::new(8, 8);
        assert_eq!(map.sample(0.0, 0.0), 1.0);
        assert_eq!(map.sample(1.0, 1.0), 1.0);
        assert_eq!(shadow_factor(&map, &vec3(0.3, 0.3, 0.99), SHADOW_BIAS), 0.0);
    }

    #[test]
    fn non_indexed_mesh_rasterizes_like_indexed() {
        let light = Light::from_config(&LightConfig::default());
        let light_space = light.light_space_matrix();
        let cube = unit_cube();

        let mut expanded = cube.clone();
        expanded.positions = cube
            .indices
            .iter()
            .map(|&i| cube.positions[i as usize])
            .collect();
        expanded.indices.clear();

        let mut indexed = DepthMap::new(64, 64);
        indexed.rasterize_mesh(&light_space, &identity(), &cube);
        let mut arrays = DepthMap::new(64, 64);
        arrays.rasterize_mesh(&light_space, &identity(), &expanded);
        assert_eq!(indexed.depths, arrays.depths);
    }

    #[test]
    fn cube_casts_shadow_on_floor_behind_it() {
        let (light, map) = demo_scene_map(1024);
        let light_space = light.light_space_matrix();

        // On the floor, on the far side of the cube as seen from (5, 8, 5).
        let behind = project_to_shadow_map(&light_space, &vec3(-0.9, -0.5, -0.9));
        assert_eq!(shadow_factor(&map, &behind, SHADOW_BIAS), 1.0);

        // Open floor with nothing between it and the light.
        let open = project_to_shadow_map(&light_space, &vec3(2.0, -0.5, -2.0));
        assert_eq!(shadow_factor(&map, &open, SHADOW_BIAS), 0.0);

        // The lit top face of the cube does not shadow itself.
        let top = project_to_shadow_map(&light_space, &vec3(0.0, 0.5, 0.0));
        assert_eq!(shadow_factor(&map, &top, SHADOW_BIAS), 0.0);
    }

    #[test]
    fn clear_resets_to_far_plane() {
        let (_, mut map) = demo_scene_map(32);
        assert!(map.depths.iter().any(|&d| d < 1.0));
        map.clear();
        assert!(map.depths.iter().all(|&d| d == 1.0));
    }
}
