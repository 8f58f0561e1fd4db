use std::sync::Arc;

use log::{error, info};
use vulkano::{
    device::Device,
    format::{ClearValue, Format},
    image::{view::ImageView, AttachmentImage, ImageUsage},
    memory::allocator::StandardMemoryAllocator,
    pipeline::graphics::viewport::Viewport,
    render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass, Subpass},
    sampler::{BorderColor, Filter, Sampler, SamplerAddressMode, SamplerCreateInfo},
};

use crate::error::{RenderError, Result, VulkanContext};

pub const SHADOW_MAP_FORMAT: Format = Format::D32_SFLOAT;

///
/// Off-screen depth target the light renders into. It has a single depth
/// attachment and no colour output; the depth image is sampled afterwards
/// through a nearest, clamp-to-white-border sampler so anything outside the
/// light volume reads as the far plane.
///
pub struct ShadowMapTarget {
    width: u32,
    height: u32,
    subpass: Subpass,
    framebuffer: Arc<Framebuffer>,
    depth_view: Arc<ImageView<AttachmentImage>>,
    sampler: Arc<Sampler>,
}

pub fn depth_only_render_pass(device: &Arc<Device>) -> Result<Arc<RenderPass>> {
    vulkano::ordered_passes_renderpass!(
        device.clone(),
        attachments: {
            depth: {
                load: Clear,
                store: Store,
                format: SHADOW_MAP_FORMAT,
                samples: 1,
            }
        },
        passes: [
            {
                color: [],
                depth_stencil: { depth },
                input: [],
            }
        ]
    )
    .vk("creating shadow render pass")
}

pub fn shadow_viewport(width: u32, height: u32) -> Viewport {
    Viewport {
        origin: [0.0, 0.0],
        dimensions: [width as f32, height as f32],
        depth_range: 0.0..1.0,
    }
}

impl ShadowMapTarget {
    pub fn create(
        device: &Arc<Device>,
        allocator: &StandardMemoryAllocator,
        width: u32,
        height: u32,
    ) -> Result<ShadowMapTarget> {
        if width == 0 || height == 0 {
            return Err(RenderError::IncompleteShadowTarget(format!(
                "zero-sized target {width}x{height}"
            )));
        }

        let render_pass = depth_only_render_pass(device)?;
        let subpass = Subpass::from(render_pass.clone(), 0).ok_or_else(|| {
            RenderError::IncompleteShadowTarget("render pass has no subpass".to_string())
        })?;

        let depth_image = AttachmentImage::with_usage(
            allocator,
            [width, height],
            SHADOW_MAP_FORMAT,
            ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED,
        )
        .vk("allocating shadow map")?;

        let depth_view = ImageView::new_default(depth_image).vk("creating shadow map view")?;

        let framebuffer = Framebuffer::new(
            render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![depth_view.clone()],
                ..Default::default()
            },
        )
        .map_err(|e| {
            error!("Shadow map framebuffer is incomplete: {e}");
            RenderError::IncompleteShadowTarget(e.to_string())
        })?;

        let sampler = Sampler::new(
            device.clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Nearest,
                min_filter: Filter::Nearest,
                address_mode: [SamplerAddressMode::ClampToBorder; 3],
                border_color: BorderColor::FloatOpaqueWhite,
                ..Default::default()
            },
        )
        .vk("creating shadow sampler")?;

        info!("Created {width}x{height} shadow map");

        Ok(ShadowMapTarget {
            width,
            height,
            subpass,
            framebuffer,
            depth_view,
            sampler,
        })
    }

    pub fn viewport(&self) -> Viewport {
        shadow_viewport(self.width, self.height)
    }

    pub fn subpass(&self) -> Subpass {
        self.subpass.clone()
    }

    pub fn framebuffer(&self) -> &Arc<Framebuffer> {
        &self.framebuffer
    }

    pub fn depth_view(&self) -> &Arc<ImageView<AttachmentImage>> {
        &self.depth_view
    }

    pub fn sampler(&self) -> &Arc<Sampler> {
        &self.sampler
    }

    /// Only the depth attachment is cleared, to the far plane.
    pub fn clear_values(&self) -> Vec<Option<ClearValue>> {
        vec![Some(1.0.into())]
    }
}
