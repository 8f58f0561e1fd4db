pub mod camera;
pub mod geometry;
pub mod lighting;
pub mod model;
pub mod obj_loader;
pub mod program;
pub mod shadow_map;
pub mod shadow_pipeline;
pub mod texture;
pub mod uniforms;

use std::sync::Arc;

use log::{debug, info, warn};
use nalgebra_glm::TMat4;
use vulkano_win::VkSurfaceBuild;

use winit::{
    dpi::LogicalSize,
    event_loop::EventLoop,
    window::{Window, WindowBuilder},
};

use vulkano::{
    command_buffer::{
        allocator::{StandardCommandBufferAllocator, StandardCommandBufferAllocatorCreateInfo},
        AutoCommandBufferBuilder, CommandBufferUsage, PrimaryAutoCommandBuffer,
    },
    device::{
        physical::PhysicalDeviceType, Device, DeviceCreateInfo, DeviceExtensions, Queue,
        QueueCreateInfo, QueueFlags,
    },
    format::{ClearValue, Format},
    image::{view::ImageView, AttachmentImage, ImageUsage, SwapchainImage},
    instance::{Instance, InstanceCreateInfo},
    memory::allocator::StandardMemoryAllocator,
    pipeline::graphics::viewport::Viewport,
    render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass, Subpass},
    swapchain::{
        self, AcquireError, CompositeAlpha, PresentMode, Swapchain, SwapchainAcquireFuture,
        SwapchainCreateInfo, SwapchainCreationError, SwapchainPresentInfo,
    },
    sync::{self, FlushError, GpuFuture},
    VulkanLibrary,
};

use crate::{
    config::DemoConfig,
    error::{RenderError, Result, VulkanContext},
};

use self::{
    camera::Camera,
    geometry::GeometryBuffer,
    lighting::Light,
    model::{RenderPart, SceneObject},
    obj_loader::Mesh,
    shadow_pipeline::{CameraMatrices, ShadowPipeline},
    texture::{DecodedImage, FileDecoder, GpuTextureUploader, TextureCache, TextureHandle, TextureUploader},
    uniforms::ShadingParams,
};

const DEPTH_FORMAT: Format = Format::D16_UNORM;

pub fn get_render_pass(device: &Arc<Device>, swapchain: &Arc<Swapchain>) -> Result<Arc<RenderPass>> {
    vulkano::ordered_passes_renderpass!(
        device.clone(),
        attachments: {
            color: {
                load: Clear,
                store: Store,
                format: swapchain.image_format(),
                samples: 1,
            },
            depth: {
                load: Clear,
                store: DontCare,
                format: DEPTH_FORMAT,
                samples: 1
            }
        },
        passes: [
            {
                color: [ color ],
                depth_stencil: { depth },
                input: [],
            }
        ]
    )
    .vk("creating scene render pass")
}

pub fn gen_framebuffers(
    images: &[Arc<SwapchainImage>],
    render_pass: &Arc<RenderPass>,
    depth_buffer: &Arc<ImageView<AttachmentImage>>,
) -> Result<Vec<Arc<Framebuffer>>> {
    images
        .iter()
        .map(|image| {
            let view = ImageView::new_default(image.clone()).vk("creating swapchain view")?;
            Framebuffer::new(
                render_pass.clone(),
                FramebufferCreateInfo {
                    attachments: vec![view, depth_buffer.clone()],
                    ..Default::default()
                },
            )
            .vk("creating scene framebuffer")
        })
        .collect()
}

fn scene_subpass(render_pass: &Arc<RenderPass>) -> Result<Subpass> {
    Subpass::from(render_pass.clone(), 0).ok_or(RenderError::Vulkan {
        context: "looking up scene subpass",
        source: "render pass has no subpass 0".into(),
    })
}

pub type Textures = TextureCache<FileDecoder, GpuTextureUploader>;

pub struct RenderSystem {
    pub render_stage: RenderStage,

    window: Arc<Window>,
    viewport: Viewport,
    device: Arc<Device>,
    queue: Arc<Queue>,
    swapchain: Arc<Swapchain>,
    images: Vec<Arc<SwapchainImage>>,
    framebuffers: Vec<Arc<Framebuffer>>,
    render_pass: Arc<RenderPass>,
    depth_buffer: Arc<ImageView<AttachmentImage>>,

    memory_allocator: Arc<StandardMemoryAllocator>,
    command_buffer_allocator: StandardCommandBufferAllocator,

    textures: Textures,
    shadow_pipeline: ShadowPipeline,

    /// Colour then depth, matching the attachment order of the scene render pass.
    clear_values: Vec<Option<ClearValue>>,

    commands: Option<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>>,
    current_image_index: u32,
    acquire_future: Option<SwapchainAcquireFuture>,
    previous_frame_end: Option<Box<dyn GpuFuture>>,
}

///
/// Where the current frame is. A frame always moves
/// Stopped -> Shadow -> Lit -> (present) -> Stopped; `NeedsRedraw` is raised
/// from outside when the window changed size and forces a swapchain rebuild
/// before the next frame starts.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStage {
    Stopped,
    Shadow,
    Lit,
    NeedsRedraw,
}

impl RenderSystem {
    ///
    /// Create the window, pick a device, build the swapchain and every GPU
    /// resource the two passes need. Any failure here is fatal to the demo.
    ///
    pub fn new(event_loop: &EventLoop<()>, config: &DemoConfig) -> Result<Self> {
        let library = VulkanLibrary::new().vk("loading vulkan library")?;
        let required_extensions = vulkano_win::required_extensions(&library);

        let instance = Instance::new(
            library,
            InstanceCreateInfo {
                enabled_extensions: required_extensions,
                ..Default::default()
            },
        )
        .vk("creating instance")?;

        let device_extensions = DeviceExtensions {
            khr_swapchain: true,
            ..DeviceExtensions::empty()
        };

        let surface = WindowBuilder::new()
            .with_title(config.title.clone())
            .with_inner_size(LogicalSize::new(config.width, config.height))
            .build_vk_surface(event_loop, instance.clone())
            .vk("creating window surface")?;

        let window = surface
            .object()
            .and_then(|object| object.clone().downcast::<Window>().ok())
            .ok_or(RenderError::NoWindow)?;

        let (physical_device, queue_index) = instance
            .enumerate_physical_devices()
            .vk("enumerating physical devices")?
            .filter(|device| device.supported_extensions().contains(&device_extensions))
            .filter_map(|device| {
                device
                    .queue_family_properties()
                    .iter()
                    .enumerate()
                    .position(|(index, queue_props)| {
                        queue_props.queue_flags.contains(QueueFlags::GRAPHICS)
                            && device
                                .surface_support(index as u32, &surface)
                                .unwrap_or(false)
                    })
                    .map(|queue_index| (device, queue_index as u32))
            })
            .min_by_key(|(device, _)| match device.properties().device_type {
                PhysicalDeviceType::DiscreteGpu => 0,
                PhysicalDeviceType::IntegratedGpu => 1,
                PhysicalDeviceType::VirtualGpu => 2,
                PhysicalDeviceType::Cpu => 3,
                _ => 4,
            })
            .ok_or(RenderError::NoDevice)?;

        info!(
            "Using device {} ({:?})",
            physical_device.properties().device_name,
            physical_device.properties().device_type
        );

        let (device, mut queues) = Device::new(
            physical_device.clone(),
            DeviceCreateInfo {
                queue_create_infos: vec![QueueCreateInfo {
                    queue_family_index: queue_index,
                    ..Default::default()
                }],
                enabled_extensions: device_extensions,
                ..Default::default()
            },
        )
        .vk("creating device")?;

        let queue = queues.next().ok_or(RenderError::NoDevice)?;

        let (swapchain, images) = {
            let image_format = physical_device
                .surface_formats(&surface, Default::default())
                .vk("querying surface formats")?
                .first()
                .map(|(format, _)| *format);

            let device_capabilities = physical_device
                .surface_capabilities(&surface, Default::default())
                .vk("querying surface capabilities")?;

            let composite_alpha = device_capabilities
                .supported_composite_alpha
                .into_iter()
                .next()
                .unwrap_or(CompositeAlpha::Opaque);

            let immediate_supported = physical_device
                .surface_present_modes(&surface)
                .vk("querying present modes")?
                .any(|mode| mode == PresentMode::Immediate);

            let present_mode = if config.uncapped_fps && immediate_supported {
                PresentMode::Immediate
            } else {
                PresentMode::Fifo
            };

            Swapchain::new(
                device.clone(),
                surface.clone(),
                SwapchainCreateInfo {
                    min_image_count: device_capabilities.min_image_count + 1,
                    image_format,
                    image_extent: window.inner_size().into(),
                    image_usage: ImageUsage::COLOR_ATTACHMENT,
                    composite_alpha,
                    present_mode,
                    ..Default::default()
                },
            )
            .vk("creating swapchain")?
        };

        let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
        let command_buffer_allocator = StandardCommandBufferAllocator::new(
            device.clone(),
            StandardCommandBufferAllocatorCreateInfo::default(),
        );

        let render_pass = get_render_pass(&device, &swapchain)?;

        let image_dimensions = swapchain.image_extent();
        let depth_buffer = ImageView::new_default(
            AttachmentImage::transient(&memory_allocator, image_dimensions, DEPTH_FORMAT)
                .vk("allocating depth buffer")?,
        )
        .vk("creating depth buffer view")?;

        let framebuffers = gen_framebuffers(&images, &render_pass, &depth_buffer)?;

        let viewport = Viewport {
            origin: [0.0, 0.0],
            dimensions: [image_dimensions[0] as f32, image_dimensions[1] as f32],
            depth_range: 0.0..1.0,
        };

        let mut textures = TextureCache::new(
            FileDecoder,
            GpuTextureUploader::new(device.clone(), memory_allocator.clone(), queue.clone()),
        );
        let fallback_texture = textures.uploader_mut().upload(&DecodedImage::white())?;

        let shadow_pipeline = ShadowPipeline::new(
            device.clone(),
            memory_allocator.clone(),
            config.shadow_map_size,
            scene_subpass(&render_pass)?,
            viewport.clone(),
            fallback_texture,
            ShadingParams {
                bias: config.shadow_bias,
                ambient_strength: config.ambient_strength,
                specular_strength: config.specular_strength,
            },
        )?;

        let previous_frame_end = Some(Box::new(sync::now(device.clone())) as Box<dyn GpuFuture>);

        Ok(RenderSystem {
            render_stage: RenderStage::Stopped,

            window,
            viewport,
            device,
            queue,
            swapchain,
            images,
            framebuffers,
            render_pass,
            depth_buffer,

            memory_allocator,
            command_buffer_allocator,

            textures,
            shadow_pipeline,

            clear_values: vec![Some(config.clear_colour.into()), Some(1.0.into())],

            commands: None,
            current_image_index: 0,
            acquire_future: None,
            previous_frame_end,
        })
    }

    pub fn extent(&self) -> [u32; 2] {
        self.swapchain.image_extent()
    }

    /// Release every cached texture. Parts uploaded earlier fall back to untextured.
    pub fn clear_textures(&mut self) {
        info!("Releasing {} cached textures", self.textures.len());
        self.textures.clear();
    }

    /// Upload meshes and resolve their diffuse maps through the texture cache.
    pub fn upload_meshes(&mut self, meshes: &[Mesh]) -> Result<Vec<RenderPart>> {
        meshes
            .iter()
            .map(|mesh| {
                let geometry = GeometryBuffer::upload(&self.memory_allocator, mesh)?;
                let texture = match &mesh.material.diffuse_texture {
                    Some(name) => self.textures.load(name),
                    None => TextureHandle::NONE,
                };
                Ok(RenderPart {
                    geometry,
                    material: mesh.material.clone(),
                    texture,
                })
            })
            .collect()
    }

    /// Ask for a swapchain rebuild before the next frame, e.g. after a resize.
    pub fn request_redraw(&mut self) {
        self.render_stage = RenderStage::NeedsRedraw;
    }

    ///
    /// Record and submit one full frame: the shadow pass from `light`, then the
    /// lit pass from `camera`, then present. A frame that cannot acquire an
    /// image (minimised or out-of-date swapchain) is skipped, not failed.
    ///
    pub fn draw_frame(
        &mut self,
        camera: &mut Camera,
        light: &Light,
        objects: &mut [SceneObject],
    ) -> Result<()> {
        if !self.start_frame()? {
            return Ok(());
        }

        camera.set_viewport_extent(self.extent());
        let light_space = light.light_space_matrix();

        self.shadow_pass(&light_space, objects)?;
        self.lit_pass(camera, &light_space, light, objects)?;
        self.finish_frame()
    }

    fn start_frame(&mut self) -> Result<bool> {
        match self.render_stage {
            RenderStage::Stopped => {}
            RenderStage::NeedsRedraw => {
                self.recreate_swapchain()?;
                self.render_stage = RenderStage::Stopped;
            }
            _ => {
                warn!("Frame started in stage {:?}; dropping it", self.render_stage);
                self.commands = None;
                self.render_stage = RenderStage::Stopped;
            }
        }

        let [width, height]: [u32; 2] = self.window.inner_size().into();
        if width == 0 || height == 0 {
            return Ok(false);
        }

        if let Some(previous) = self.previous_frame_end.as_mut() {
            previous.cleanup_finished();
        }

        let (image_index, suboptimal, acquire_future) =
            match swapchain::acquire_next_image(self.swapchain.clone(), None) {
                Ok(r) => r,
                Err(AcquireError::OutOfDate) => {
                    self.render_stage = RenderStage::NeedsRedraw;
                    return Ok(false);
                }
                Err(e) => return Err(e).vk("acquiring swapchain image"),
            };

        if suboptimal {
            debug!("Suboptimal swapchain. Recreating next frame.");
            self.render_stage = RenderStage::NeedsRedraw;
        }

        let builder = AutoCommandBufferBuilder::primary(
            &self.command_buffer_allocator,
            self.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .vk("creating command buffer")?;

        self.commands = Some(builder);
        self.current_image_index = image_index;
        self.acquire_future = Some(acquire_future);
        if !suboptimal {
            self.render_stage = RenderStage::Shadow;
        }
        Ok(true)
    }

    fn shadow_pass(&mut self, light_space: &TMat4<f32>, objects: &mut [SceneObject]) -> Result<()> {
        let mut commands = self.take_commands()?;
        self.shadow_pipeline
            .render_shadow_pass(&mut commands, light_space, objects)?;
        self.commands = Some(commands);

        if self.render_stage == RenderStage::Shadow {
            self.render_stage = RenderStage::Lit;
        }
        Ok(())
    }

    fn lit_pass(
        &mut self,
        camera: &Camera,
        light_space: &TMat4<f32>,
        light: &Light,
        objects: &mut [SceneObject],
    ) -> Result<()> {
        let framebuffer = self.framebuffers[self.current_image_index as usize].clone();
        let (view, projection) = (camera.view(), camera.projection());

        let mut commands = self.take_commands()?;
        self.shadow_pipeline.render_lit_pass(
            &mut commands,
            framebuffer,
            self.clear_values.clone(),
            CameraMatrices {
                view: &view,
                projection: &projection,
                position: &camera.position,
            },
            light_space,
            light,
            objects,
            &self.textures,
        )?;
        self.commands = Some(commands);
        Ok(())
    }

    fn take_commands(&mut self) -> Result<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>> {
        self.commands.take().ok_or(RenderError::Vulkan {
            context: "recording frame",
            source: "no frame in progress".into(),
        })
    }

    fn finish_frame(&mut self) -> Result<()> {
        let commands = self.take_commands()?;
        let command_buffer = commands.build().vk("building command buffer")?;

        let acquire_future = self.acquire_future.take().ok_or(RenderError::Vulkan {
            context: "presenting frame",
            source: "no acquired image".into(),
        })?;

        let previous = self
            .previous_frame_end
            .take()
            .unwrap_or_else(|| Box::new(sync::now(self.device.clone())) as Box<dyn GpuFuture>);

        let future = previous
            .join(acquire_future)
            .then_execute(self.queue.clone(), command_buffer)
            .vk("submitting frame")?
            .then_swapchain_present(
                self.queue.clone(),
                SwapchainPresentInfo::swapchain_image_index(
                    self.swapchain.clone(),
                    self.current_image_index,
                ),
            )
            .then_signal_fence_and_flush();

        let result = match future {
            Ok(future) => {
                self.previous_frame_end = Some(Box::new(future) as Box<_>);
                Ok(())
            }
            Err(FlushError::OutOfDate) => {
                self.render_stage = RenderStage::NeedsRedraw;
                self.previous_frame_end = Some(Box::new(sync::now(self.device.clone())) as Box<_>);
                Ok(())
            }
            Err(e) => {
                self.previous_frame_end = Some(Box::new(sync::now(self.device.clone())) as Box<_>);
                Err(e).vk("flushing frame")
            }
        };

        if self.render_stage != RenderStage::NeedsRedraw {
            self.render_stage = RenderStage::Stopped;
        }
        result
    }

    pub fn recreate_swapchain(&mut self) -> Result<()> {
        let new_dimensions = self.window.inner_size();

        let (new_swapchain, new_images) = match self.swapchain.recreate(SwapchainCreateInfo {
            image_extent: new_dimensions.into(),
            ..self.swapchain.create_info()
        }) {
            Ok(r) => r,
            Err(SwapchainCreationError::ImageExtentNotSupported { .. }) => return Ok(()),
            Err(e) => return Err(e).vk("recreating swapchain"),
        };

        self.swapchain = new_swapchain;
        self.images = new_images;
        self.render_pass = get_render_pass(&self.device, &self.swapchain)?;

        let new_depth_dimensions = self.swapchain.image_extent();

        self.depth_buffer = ImageView::new_default(
            AttachmentImage::transient(&self.memory_allocator, new_depth_dimensions, DEPTH_FORMAT)
                .vk("allocating depth buffer")?,
        )
        .vk("creating depth buffer view")?;

        self.framebuffers = gen_framebuffers(&self.images, &self.render_pass, &self.depth_buffer)?;

        self.viewport.dimensions = [
            new_depth_dimensions[0] as f32,
            new_depth_dimensions[1] as f32,
        ];

        self.shadow_pipeline
            .rebuild_for_viewport(scene_subpass(&self.render_pass)?, self.viewport.clone())?;

        debug!("Swapchain recreated at {new_depth_dimensions:?}");
        Ok(())
    }
}
