mod primitives;

pub use self::primitives::{plane, unit_cube};

use std::path::Path;

use log::{debug, info, warn};
use nalgebra_glm::{vec3, TVec3};

use crate::error::{RenderError, Result};

/// Specular exponent used when a material leaves `Ns` unset or non-positive.
pub const DEFAULT_SHININESS: f32 = 32.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    /// Raw `Ns` value as read from the MTL file.
    pub shininess: f32,
    pub diffuse_texture: Option<String>,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            name: "default".to_string(),
            ambient: [0.8, 0.8, 0.8],
            diffuse: [0.8, 0.8, 0.8],
            specular: [0.5, 0.5, 0.5],
            shininess: 0.0,
            diffuse_texture: None,
        }
    }
}

impl Material {
    pub fn coloured(diffuse: [f32; 3]) -> Material {
        Material {
            ambient: diffuse,
            diffuse,
            ..Default::default()
        }
    }

    /// The exponent that reaches the shader.
    pub fn specular_exponent(&self) -> f32 {
        if self.shininess > 0.0 {
            self.shininess
        } else {
            DEFAULT_SHININESS
        }
    }

    fn from_tobj(material: &tobj::Material) -> Material {
        let fallback = Material::default();
        Material {
            name: material.name.clone(),
            ambient: material.ambient.unwrap_or(fallback.ambient),
            diffuse: material.diffuse.unwrap_or(fallback.diffuse),
            specular: material.specular.unwrap_or(fallback.specular),
            shininess: material.shininess.unwrap_or(0.0),
            diffuse_texture: material
                .diffuse_texture
                .clone()
                .filter(|name| !name.trim().is_empty()),
        }
    }
}

/// CPU-side triangle mesh. Attribute arrays are parallel; `indices` may be empty.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Fill in smooth normals by accumulating face normals. Existing normals are kept.
    pub fn generate_missing_normals(&mut self) {
        if self.normals.len() == self.positions.len() {
            return;
        }

        let mut accumulated = vec![TVec3::<f32>::zeros(); self.positions.len()];
        let triangles: Vec<[usize; 3]> = if self.indices.is_empty() {
            (0..self.positions.len() / 3)
                .map(|t| [3 * t, 3 * t + 1, 3 * t + 2])
                .collect()
        } else {
            self.indices
                .chunks_exact(3)
                .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
                .collect()
        };

        for [a, b, c] in triangles {
            let pa = TVec3::from(self.positions[a]);
            let e1 = TVec3::from(self.positions[b]) - pa;
            let e2 = TVec3::from(self.positions[c]) - pa;
            let face = e1.cross(&e2);
            for i in [a, b, c] {
                accumulated[i] += face;
            }
        }

        self.normals = accumulated.iter().map(unit_or_up).collect();
    }
}

/// Unit vector along `v`; degenerate input points up.
pub(crate) fn unit_or_up(v: &TVec3<f32>) -> [f32; 3] {
    v.try_normalize(f32::EPSILON)
        .unwrap_or_else(|| vec3(0.0, 1.0, 0.0))
        .into()
}

pub struct Loader;

impl Loader {
    ///
    /// Load every mesh of an OBJ file together with its MTL material.
    /// A broken or missing MTL file is not fatal: affected meshes get the default material.
    ///
    pub fn load(path: &Path) -> Result<Vec<Mesh>> {
        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .map_err(|source| RenderError::ModelLoad {
            path: path.display().to_string(),
            source,
        })?;

        let materials = materials.unwrap_or_else(|e| {
            warn!("Could not read materials for {}: {e}", path.display());
            Vec::new()
        });

        info!(
            "Loaded {} meshes and {} materials from {}",
            models.len(),
            materials.len(),
            path.display()
        );

        let meshes: Vec<Mesh> = models
            .into_iter()
            .map(|model| {
                let material = model
                    .mesh
                    .material_id
                    .and_then(|id| materials.get(id))
                    .map(Material::from_tobj)
                    .unwrap_or_default();

                debug!(
                    "Mesh '{}' -> material '{}' (Kd: {:?})",
                    model.name, material.name, material.diffuse
                );

                mesh_from_tobj(model.name, model.mesh, material)
            })
            .collect();

        if meshes.iter().all(|m| m.positions.is_empty()) {
            return Err(RenderError::EmptyMesh(path.display().to_string()));
        }

        Ok(meshes)
    }
}

fn mesh_from_tobj(name: String, mesh: tobj::Mesh, material: Material) -> Mesh {
    let positions: Vec<[f32; 3]> = mesh
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();

    let normals: Vec<[f32; 3]> = mesh
        .normals
        .chunks_exact(3)
        .map(|n| [n[0], n[1], n[2]])
        .collect();

    let texcoords: Vec<[f32; 2]> = if mesh.texcoords.len() / 2 == positions.len() {
        mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]).collect()
    } else {
        vec![[0.0, 0.0]; positions.len()]
    };

    let mut mesh = Mesh {
        name,
        positions,
        normals,
        texcoords,
        indices: mesh.indices,
        material,
    };
    mesh.generate_missing_normals();
    mesh
}
