use std::sync::Arc;

use log::{debug, info};
use nalgebra_glm::{TMat4, TVec3};
use vulkano::{
    buffer::{
        allocator::{SubbufferAllocator, SubbufferAllocatorCreateInfo},
        BufferContents, BufferUsage, Subbuffer,
    },
    command_buffer::{
        AutoCommandBufferBuilder, PrimaryAutoCommandBuffer, RenderPassBeginInfo, SubpassContents,
    },
    descriptor_set::{
        allocator::StandardDescriptorSetAllocator, PersistentDescriptorSet, WriteDescriptorSet,
    },
    device::Device,
    format::ClearValue,
    image::{view::ImageView, ImmutableImage},
    memory::allocator::{MemoryUsage, StandardMemoryAllocator},
    pipeline::graphics::viewport::Viewport,
    render_pass::{Framebuffer, Subpass},
    sampler::{Filter, Sampler, SamplerAddressMode, SamplerCreateInfo},
};

use super::{
    lighting::Light,
    model::{ProgramKind, SceneObject},
    program::{
        ProgramDesc, ShaderProgram, DEPTH_SLOTS, EMISSIVE_SLOTS, FRAME_SET, LIT_SLOTS, OBJECT_SET,
    },
    shadow_map::ShadowMapTarget,
    texture::{ImageDecoder, TextureCache, TextureUploader},
    uniforms::{FrameUniform, LightSpaceUniform, ModelUniform, ObjectUniform, ShadingParams},
};
use crate::{
    error::{Result, VulkanContext},
    shaders::{depth_frag, depth_vert, emissive_frag, lit_frag, lit_vert},
};

pub type TextureView = Arc<ImageView<ImmutableImage>>;

/// Per-frame camera inputs to the lit pass.
pub struct CameraMatrices<'a> {
    pub view: &'a TMat4<f32>,
    pub projection: &'a TMat4<f32>,
    pub position: &'a TVec3<f32>,
}

///
/// Two-pass shadow renderer. Every frame the scene is first drawn into the
/// [`ShadowMapTarget`] from the light with the depth program, then drawn into
/// the window framebuffer with the lit (or emissive) program, which samples
/// the depth image to decide whether each fragment is in shadow.
///
/// The shadow map only ever lives in the per-frame set and the diffuse map
/// only in the per-object set, so the two samplers can never collide.
///
pub struct ShadowPipeline {
    device: Arc<Device>,
    target: ShadowMapTarget,

    depth_program: ShaderProgram,
    lit_program: ShaderProgram,
    emissive_program: ShaderProgram,

    descriptor_set_allocator: StandardDescriptorSetAllocator,
    uniform_allocator: SubbufferAllocator,

    diffuse_sampler: Arc<Sampler>,
    fallback_texture: TextureView,

    shading: ShadingParams,
}

fn link_depth_program(device: &Arc<Device>, target: &ShadowMapTarget) -> Result<ShaderProgram> {
    ShaderProgram::link(
        device.clone(),
        ProgramDesc {
            name: "depth",
            vertex: depth_vert::load(device.clone()).vk("loading depth vertex shader")?,
            fragment: depth_frag::load(device.clone()).vk("loading depth fragment shader")?,
            subpass: target.subpass(),
            viewport: target.viewport(),
            slots: DEPTH_SLOTS,
        },
    )
}

fn link_scene_programs(
    device: &Arc<Device>,
    subpass: Subpass,
    viewport: Viewport,
) -> Result<(ShaderProgram, ShaderProgram)> {
    let lit = ShaderProgram::link(
        device.clone(),
        ProgramDesc {
            name: "lit",
            vertex: lit_vert::load(device.clone()).vk("loading lit vertex shader")?,
            fragment: lit_frag::load(device.clone()).vk("loading lit fragment shader")?,
            subpass: subpass.clone(),
            viewport: viewport.clone(),
            slots: LIT_SLOTS,
        },
    )?;

    let emissive = ShaderProgram::link(
        device.clone(),
        ProgramDesc {
            name: "emissive",
            vertex: lit_vert::load(device.clone()).vk("loading lit vertex shader")?,
            fragment: emissive_frag::load(device.clone()).vk("loading emissive fragment shader")?,
            subpass,
            viewport,
            slots: EMISSIVE_SLOTS,
        },
    )?;

    Ok((lit, emissive))
}

impl ShadowPipeline {
    ///
    /// `scene_subpass` and `viewport` describe the window pass the lit programs
    /// render into. `fallback_texture` is bound wherever an object has no
    /// diffuse map so the descriptor stays valid; the shader never samples it.
    ///
    pub fn new(
        device: Arc<Device>,
        memory_allocator: Arc<StandardMemoryAllocator>,
        shadow_map_size: u32,
        scene_subpass: Subpass,
        viewport: Viewport,
        fallback_texture: TextureView,
        shading: ShadingParams,
    ) -> Result<ShadowPipeline> {
        let target = ShadowMapTarget::create(
            &device,
            &memory_allocator,
            shadow_map_size,
            shadow_map_size,
        )?;

        let depth_program = link_depth_program(&device, &target)?;
        let (lit_program, emissive_program) =
            link_scene_programs(&device, scene_subpass, viewport)?;

        let uniform_allocator = SubbufferAllocator::new(
            memory_allocator,
            SubbufferAllocatorCreateInfo {
                buffer_usage: BufferUsage::UNIFORM_BUFFER,
                memory_usage: MemoryUsage::Upload,
                ..Default::default()
            },
        );

        let diffuse_sampler = Sampler::new(
            device.clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                address_mode: [SamplerAddressMode::Repeat; 3],
                ..Default::default()
            },
        )
        .vk("creating diffuse sampler")?;

        info!(
            "Shadow pipeline ready ({shadow_map_size}x{shadow_map_size}, bias {})",
            shading.bias
        );

        Ok(ShadowPipeline {
            descriptor_set_allocator: StandardDescriptorSetAllocator::new(device.clone()),
            device,
            target,
            depth_program,
            lit_program,
            emissive_program,
            uniform_allocator,
            diffuse_sampler,
            fallback_texture,
            shading,
        })
    }

    /// Re-link the window programs after the swapchain changed size.
    pub fn rebuild_for_viewport(&mut self, scene_subpass: Subpass, viewport: Viewport) -> Result<()> {
        let (lit, emissive) = link_scene_programs(&self.device, scene_subpass, viewport)?;
        self.lit_program = lit;
        self.emissive_program = emissive;
        Ok(())
    }

    fn upload_uniform<T>(&self, data: T) -> Result<Subbuffer<T>>
    where
        T: BufferContents,
    {
        let buffer: Subbuffer<T> = self
            .uniform_allocator
            .allocate_sized()
            .vk("allocating uniform buffer")?;
        *buffer.write().vk("writing uniform buffer")? = data;
        Ok(buffer)
    }

    ///
    /// Pass 1. Clears the shadow map to the far plane and writes the depth of
    /// every shadow-casting object as seen through `light_space`.
    ///
    pub fn render_shadow_pass(
        &self,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        light_space: &TMat4<f32>,
        objects: &mut [SceneObject],
    ) -> Result<()> {
        builder
            .begin_render_pass(
                RenderPassBeginInfo {
                    clear_values: self.target.clear_values(),
                    ..RenderPassBeginInfo::framebuffer(self.target.framebuffer().clone())
                },
                SubpassContents::Inline,
            )
            .vk("beginning shadow pass")?;

        let light_buffer = self.upload_uniform(LightSpaceUniform {
            light_space: (*light_space).into(),
        })?;
        let light_set = PersistentDescriptorSet::new(
            &self.descriptor_set_allocator,
            self.depth_program.set_layout(FRAME_SET)?.clone(),
            [WriteDescriptorSet::buffer(0, light_buffer)],
        )
        .vk("creating light space descriptor set")?;

        for object in objects.iter_mut().filter(|o| o.casts_shadow()) {
            let model_buffer = self.upload_uniform(ModelUniform {
                model: object.transform.model_matrix().into(),
            })?;
            let model_set = PersistentDescriptorSet::new(
                &self.descriptor_set_allocator,
                self.depth_program.set_layout(OBJECT_SET)?.clone(),
                [WriteDescriptorSet::buffer(0, model_buffer)],
            )
            .vk("creating model descriptor set")?;

            self.depth_program
                .bind(builder, (light_set.clone(), model_set));

            for part in object.parts() {
                part.geometry.draw(builder)?;
            }
        }

        builder.end_render_pass().vk("ending shadow pass")?;
        Ok(())
    }

    ///
    /// Pass 2. Renders into `framebuffer` (cleared with `clear_values`) using
    /// each object's program. Must run after [`Self::render_shadow_pass`] in
    /// the same command buffer, with the same `light_space`.
    ///
    #[allow(clippy::too_many_arguments)]
    pub fn render_lit_pass<D, U>(
        &self,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        framebuffer: Arc<Framebuffer>,
        clear_values: Vec<Option<ClearValue>>,
        camera: CameraMatrices<'_>,
        light_space: &TMat4<f32>,
        light: &Light,
        objects: &mut [SceneObject],
        textures: &TextureCache<D, U>,
    ) -> Result<()>
    where
        D: ImageDecoder,
        U: TextureUploader<Texture = TextureView>,
    {
        builder
            .begin_render_pass(
                RenderPassBeginInfo {
                    clear_values,
                    ..RenderPassBeginInfo::framebuffer(framebuffer)
                },
                SubpassContents::Inline,
            )
            .vk("beginning lit pass")?;

        let frame_buffer = self.upload_uniform(FrameUniform::new(
            camera.view,
            camera.projection,
            light_space,
            light,
            camera.position,
            self.shading,
        ))?;

        let lit_frame_set = PersistentDescriptorSet::new(
            &self.descriptor_set_allocator,
            self.lit_program.set_layout(FRAME_SET)?.clone(),
            [
                WriteDescriptorSet::buffer(0, frame_buffer.clone()),
                WriteDescriptorSet::image_view_sampler(
                    1,
                    self.target.depth_view().clone(),
                    self.target.sampler().clone(),
                ),
            ],
        )
        .vk("creating lit frame descriptor set")?;

        let emissive_frame_set = PersistentDescriptorSet::new(
            &self.descriptor_set_allocator,
            self.emissive_program.set_layout(FRAME_SET)?.clone(),
            [WriteDescriptorSet::buffer(0, frame_buffer)],
        )
        .vk("creating emissive frame descriptor set")?;

        for object in objects.iter_mut() {
            let model = object.transform.model_matrix();

            for part in object.parts() {
                let texture = textures.get(part.texture);
                let object_buffer =
                    self.upload_uniform(ObjectUniform::new(&model, &part.material, texture.is_some()))?;

                match object.program() {
                    ProgramKind::Lit => {
                        let diffuse = texture.unwrap_or(&self.fallback_texture).clone();
                        let object_set = PersistentDescriptorSet::new(
                            &self.descriptor_set_allocator,
                            self.lit_program.set_layout(OBJECT_SET)?.clone(),
                            [
                                WriteDescriptorSet::buffer(0, object_buffer),
                                WriteDescriptorSet::image_view_sampler(
                                    1,
                                    diffuse,
                                    self.diffuse_sampler.clone(),
                                ),
                            ],
                        )
                        .vk("creating lit object descriptor set")?;

                        self.lit_program
                            .bind(builder, (lit_frame_set.clone(), object_set));
                    }
                    ProgramKind::Emissive => {
                        let object_set = PersistentDescriptorSet::new(
                            &self.descriptor_set_allocator,
                            self.emissive_program.set_layout(OBJECT_SET)?.clone(),
                            [WriteDescriptorSet::buffer(0, object_buffer)],
                        )
                        .vk("creating emissive object descriptor set")?;

                        self.emissive_program
                            .bind(builder, (emissive_frame_set.clone(), object_set));
                    }
                }

                part.geometry.draw(builder)?;
            }
        }

        debug!("Lit pass recorded for {} objects", objects.len());

        builder.end_render_pass().vk("ending lit pass")?;
        Ok(())
    }
}
