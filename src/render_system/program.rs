use std::{collections::BTreeMap, sync::Arc};

use log::{error, info};
use vulkano::{
    command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer},
    descriptor_set::{
        layout::{DescriptorSetLayout, DescriptorType},
        DescriptorSetsCollection,
    },
    device::Device,
    pipeline::{
        graphics::{
            depth_stencil::DepthStencilState,
            input_assembly::InputAssemblyState,
            rasterization::{CullMode, RasterizationState},
            vertex_input::Vertex,
            viewport::{Viewport, ViewportState},
        },
        GraphicsPipeline, Pipeline, PipelineBindPoint,
    },
    render_pass::Subpass,
    shader::ShaderModule,
};

use super::geometry::Vert;
use crate::error::{RenderError, Result, VulkanContext};

/// Per-frame descriptor set: camera/light data and the shadow map.
pub const FRAME_SET: u32 = 0;
/// Per-object descriptor set: transform, material and diffuse map.
pub const OBJECT_SET: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    UniformBuffer,
    Sampler,
}

/// A named descriptor a program cannot work without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub name: &'static str,
    pub set: u32,
    pub binding: u32,
    pub kind: SlotKind,
}

const fn slot(name: &'static str, set: u32, binding: u32, kind: SlotKind) -> Slot {
    Slot {
        name,
        set,
        binding,
        kind,
    }
}

pub const DEPTH_SLOTS: &[Slot] = &[
    slot("light_space", FRAME_SET, 0, SlotKind::UniformBuffer),
    slot("model", OBJECT_SET, 0, SlotKind::UniformBuffer),
];

// The diffuse map and the shadow map live in different sets so they can never alias.
pub const LIT_SLOTS: &[Slot] = &[
    slot("frame", FRAME_SET, 0, SlotKind::UniformBuffer),
    slot("shadow_map", FRAME_SET, 1, SlotKind::Sampler),
    slot("object", OBJECT_SET, 0, SlotKind::UniformBuffer),
    slot("diffuse_map", OBJECT_SET, 1, SlotKind::Sampler),
];

pub const EMISSIVE_SLOTS: &[Slot] = &[
    slot("frame", FRAME_SET, 0, SlotKind::UniformBuffer),
    slot("object", OBJECT_SET, 0, SlotKind::UniformBuffer),
];

pub struct ProgramDesc {
    pub name: &'static str,
    pub vertex: Arc<ShaderModule>,
    pub fragment: Arc<ShaderModule>,
    pub subpass: Subpass,
    pub viewport: Viewport,
    pub slots: &'static [Slot],
}

/// A linked graphics pipeline whose required descriptor slots were checked at link time.
pub struct ShaderProgram {
    name: &'static str,
    pipeline: Arc<GraphicsPipeline>,
}

impl ShaderProgram {
    ///
    /// Build the pipeline for a vertex/fragment pair. Vertex attributes are taken
    /// from [`Vert`]: position, normal and uv at locations 0, 1 and 2.
    /// The shader modules are released once the pipeline exists.
    ///
    pub fn link(device: Arc<Device>, desc: ProgramDesc) -> Result<ShaderProgram> {
        let vertex_entry = desc
            .vertex
            .entry_point("main")
            .ok_or(RenderError::MissingEntryPoint { program: desc.name })?;
        let fragment_entry = desc
            .fragment
            .entry_point("main")
            .ok_or(RenderError::MissingEntryPoint { program: desc.name })?;

        let pipeline = GraphicsPipeline::start()
            .vertex_input_state(Vert::per_vertex())
            .vertex_shader(vertex_entry, ())
            .input_assembly_state(InputAssemblyState::new())
            .viewport_state(ViewportState::viewport_fixed_scissor_irrelevant([desc.viewport]))
            .fragment_shader(fragment_entry, ())
            .depth_stencil_state(DepthStencilState::simple_depth_test())
            .rasterization_state(RasterizationState::new().cull_mode(CullMode::None))
            .render_pass(desc.subpass)
            .build(device)
            .vk("linking graphics pipeline")
            .map_err(|e| {
                error!("Failed to link program `{}`: {e}", desc.name);
                e
            })?;

        validate_slots(desc.name, desc.slots, &present_slots(&pipeline))?;

        info!("Linked program `{}`", desc.name);

        Ok(ShaderProgram {
            name: desc.name,
            pipeline,
        })
    }

    pub fn set_layout(&self, set: u32) -> Result<&Arc<DescriptorSetLayout>> {
        self.pipeline
            .layout()
            .set_layouts()
            .get(set as usize)
            .ok_or(RenderError::MissingSlot {
                program: self.name,
                slot: "descriptor set",
                set,
                binding: 0,
            })
    }

    pub fn bind<S>(&self, builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>, descriptor_sets: S)
    where
        S: DescriptorSetsCollection,
    {
        builder
            .bind_pipeline_graphics(self.pipeline.clone())
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                self.pipeline.layout().clone(),
                0,
                descriptor_sets,
            );
    }
}

fn present_slots(pipeline: &GraphicsPipeline) -> BTreeMap<(u32, u32), SlotKind> {
    let mut present = BTreeMap::new();
    for (set, layout) in pipeline.layout().set_layouts().iter().enumerate() {
        for (binding, descriptor) in layout.bindings() {
            let kind = match descriptor.descriptor_type {
                DescriptorType::UniformBuffer => SlotKind::UniformBuffer,
                DescriptorType::CombinedImageSampler => SlotKind::Sampler,
                _ => continue,
            };
            present.insert((set as u32, *binding), kind);
        }
    }
    present
}

/// Fails with the first required slot that is absent or of the wrong kind.
pub fn validate_slots(
    program: &'static str,
    required: &[Slot],
    present: &BTreeMap<(u32, u32), SlotKind>,
) -> Result<()> {
    for slot in required {
        if present.get(&(slot.set, slot.binding)) != Some(&slot.kind) {
            error!(
                "Program `{program}` lacks {:?} `{}` at set {} binding {}",
                slot.kind, slot.name, slot.set, slot.binding
            );
            return Err(RenderError::MissingSlot {
                program,
                slot: slot.name,
                set: slot.set,
                binding: slot.binding,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_of(slots: &[Slot]) -> BTreeMap<(u32, u32), SlotKind> {
        slots.iter().map(|s| ((s.set, s.binding), s.kind)).collect()
    }

    #[test]
    fn complete_layout_passes() {
        assert!(validate_slots("lit", LIT_SLOTS, &layout_of(LIT_SLOTS)).is_ok());
        assert!(validate_slots("depth", DEPTH_SLOTS, &layout_of(DEPTH_SLOTS)).is_ok());
    }

    #[test]
    fn stripped_sampler_is_reported_by_name() {
        let mut present = layout_of(LIT_SLOTS);
        present.remove(&(FRAME_SET, 1));

        match validate_slots("lit", LIT_SLOTS, &present) {
            Err(RenderError::MissingSlot { program, slot, set, binding }) => {
                assert_eq!(program, "lit");
                assert_eq!(slot, "shadow_map");
                assert_eq!((set, binding), (FRAME_SET, 1));
            }
            other => panic!("expected missing slot, got {other:?}"),
        }
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let mut present = layout_of(EMISSIVE_SLOTS);
        present.insert((OBJECT_SET, 0), SlotKind::Sampler);
        assert!(validate_slots("emissive", EMISSIVE_SLOTS, &present).is_err());
    }

    #[test]
    fn shadow_and_diffuse_maps_never_share_a_binding() {
        let shadow = LIT_SLOTS.iter().find(|s| s.name == "shadow_map").unwrap();
        let diffuse = LIT_SLOTS.iter().find(|s| s.name == "diffuse_map").unwrap();
        assert_ne!((shadow.set, shadow.binding), (diffuse.set, diffuse.binding));
    }
}
