use bytemuck::{Pod, Zeroable};
use log::debug;
use vulkano::{
    buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer},
    memory::allocator::{AllocationCreateInfo, MemoryUsage, StandardMemoryAllocator},
    pipeline::graphics::vertex_input::Vertex,
};

use super::obj_loader::Mesh;
use crate::error::{RenderError, Result, VulkanContext};

/// Interleaved vertex: 8 floats, position at location 0, normal at 1, uv at 2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Vertex, Zeroable, Pod)]
#[repr(C)]
pub struct Vert {
    #[format(R32G32B32_SFLOAT)]
    pub position: [f32; 3],
    #[format(R32G32B32_SFLOAT)]
    pub normal: [f32; 3],
    #[format(R32G32_SFLOAT)]
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Indexed { index_count: u32 },
    Arrays { vertex_count: u32 },
}

impl DrawMode {
    /// Indexed drawing whenever the mesh carries an index list.
    pub fn for_mesh(mesh: &Mesh) -> DrawMode {
        if mesh.indices.is_empty() {
            DrawMode::Arrays {
                vertex_count: mesh.vertex_count() as u32,
            }
        } else {
            DrawMode::Indexed {
                index_count: mesh.index_count() as u32,
            }
        }
    }
}

/// Flatten a mesh into the fixed [pos, normal, uv] layout. Missing attributes are zeroed.
pub fn interleave(mesh: &Mesh) -> Vec<Vert> {
    mesh.positions
        .iter()
        .enumerate()
        .map(|(i, position)| Vert {
            position: *position,
            normal: mesh.normals.get(i).copied().unwrap_or_default(),
            uv: mesh.texcoords.get(i).copied().unwrap_or_default(),
        })
        .collect()
}

/// Sizes fixed at upload time; they decide which draw call a buffer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryCounts {
    vertex_count: u32,
    draw_mode: DrawMode,
}

impl GeometryCounts {
    pub fn for_mesh(mesh: &Mesh) -> Result<GeometryCounts> {
        if mesh.positions.is_empty() {
            return Err(RenderError::EmptyMesh(mesh.name.clone()));
        }
        Ok(GeometryCounts {
            vertex_count: mesh.vertex_count() as u32,
            draw_mode: DrawMode::for_mesh(mesh),
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Zero for meshes drawn without an index list.
    pub fn index_count(&self) -> u32 {
        match self.draw_mode {
            DrawMode::Indexed { index_count } => index_count,
            DrawMode::Arrays { .. } => 0,
        }
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }
}

///
/// GPU copy of one mesh. Buffers are written once at upload and never touched again;
/// re-uploading a mesh produces a new `GeometryBuffer`.
///
pub struct GeometryBuffer {
    vertices: Subbuffer<[Vert]>,
    indices: Option<Subbuffer<[u32]>>,
    counts: GeometryCounts,
}

impl GeometryBuffer {
    pub fn upload(allocator: &StandardMemoryAllocator, mesh: &Mesh) -> Result<GeometryBuffer> {
        let counts = GeometryCounts::for_mesh(mesh)?;

        let vertices = Buffer::from_iter(
            allocator,
            BufferCreateInfo {
                usage: BufferUsage::VERTEX_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                usage: MemoryUsage::Upload,
                ..Default::default()
            },
            interleave(mesh),
        )
        .vk("uploading vertex buffer")?;

        let indices = match counts.draw_mode() {
            DrawMode::Indexed { .. } => Some(
                Buffer::from_iter(
                    allocator,
                    BufferCreateInfo {
                        usage: BufferUsage::INDEX_BUFFER,
                        ..Default::default()
                    },
                    AllocationCreateInfo {
                        usage: MemoryUsage::Upload,
                        ..Default::default()
                    },
                    mesh.indices.iter().copied(),
                )
                .vk("uploading index buffer")?,
            ),
            DrawMode::Arrays { .. } => None,
        };

        debug!(
            "Uploaded mesh '{}': {} vertices, {} indices",
            mesh.name,
            counts.vertex_count(),
            counts.index_count()
        );

        Ok(GeometryBuffer {
            vertices,
            indices,
            counts,
        })
    }

    /// Record the draw call. The pipeline and descriptor sets must already be bound.
    pub fn draw(&self, builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>) -> Result<()> {
        builder.bind_vertex_buffers(0, self.vertices.clone());

        match (&self.indices, self.counts.draw_mode()) {
            (Some(indices), DrawMode::Indexed { index_count }) => {
                builder
                    .bind_index_buffer(indices.clone())
                    .draw_indexed(index_count, 1, 0, 0, 0)
                    .vk("drawing indexed geometry")?;
            }
            _ => {
                builder
                    .draw(self.counts.vertex_count(), 1, 0, 0)
                    .vk("drawing geometry")?;
            }
        }

        Ok(())
    }
}
