use std::{
    collections::HashMap,
    fmt::Display,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::GenericImageView;
use log::{debug, error, warn};
use vulkano::{
    command_buffer::{
        allocator::{StandardCommandBufferAllocator, StandardCommandBufferAllocatorCreateInfo},
        AutoCommandBufferBuilder, CommandBufferUsage, PrimaryCommandBufferAbstract,
    },
    device::{Device, Queue},
    format::Format,
    image::{view::ImageView, ImageDimensions, ImmutableImage, MipmapsCount},
    memory::allocator::StandardMemoryAllocator,
    sync::GpuFuture,
};

use crate::error::{Result, VulkanContext};

/// Prefixes tried, in order, when resolving a texture file name.
pub const SEARCH_PREFIXES: [&str; 5] = ["", "textures", "Textures", ".", "../textures"];

/// Id issued by a [`TextureCache`]. `0` is the "no texture" sentinel; ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureHandle(u32);

impl TextureHandle {
    pub const NONE: TextureHandle = TextureHandle(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Luma8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn from_channel_count(channels: u8) -> Option<PixelFormat> {
        match channels {
            1 => Some(PixelFormat::Luma8),
            3 => Some(PixelFormat::Rgb8),
            4 => Some(PixelFormat::Rgba8),
            _ => None,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Luma8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn white() -> DecodedImage {
        DecodedImage {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba8,
            pixels: vec![255; 4],
        }
    }

    /// Pixel data length agrees with the dimensions and format.
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.width as usize * self.height as usize * self.format.channels()
    }

    /// Widen to four channels; grey is replicated, alpha is opaque.
    pub fn to_rgba8(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba8 => self.pixels.clone(),
            PixelFormat::Rgb8 => self
                .pixels
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            PixelFormat::Luma8 => self.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        }
    }
}

pub trait ImageDecoder {
    type Error: Display;

    fn decode(&mut self, path: &Path) -> std::result::Result<DecodedImage, Self::Error>;
}

pub trait TextureUploader {
    type Texture;

    fn upload(&mut self, image: &DecodedImage) -> Result<Self::Texture>;
}

/// Decodes files with the `image` crate.
#[derive(Debug, Default)]
pub struct FileDecoder;

impl ImageDecoder for FileDecoder {
    type Error = image::ImageError;

    fn decode(&mut self, path: &Path) -> std::result::Result<DecodedImage, image::ImageError> {
        let decoded = image::open(path)?;
        let (width, height) = (decoded.width(), decoded.height());

        let (format, pixels) = match PixelFormat::from_channel_count(decoded.color().channel_count()) {
            Some(PixelFormat::Luma8) => (PixelFormat::Luma8, decoded.to_luma8().into_raw()),
            Some(PixelFormat::Rgb8) => (PixelFormat::Rgb8, decoded.to_rgb8().into_raw()),
            // Grey+alpha and anything exotic goes through RGBA.
            _ => (PixelFormat::Rgba8, decoded.to_rgba8().into_raw()),
        };

        Ok(DecodedImage {
            width,
            height,
            format,
            pixels,
        })
    }
}

pub fn candidate_paths(filename: &str) -> Vec<PathBuf> {
    SEARCH_PREFIXES
        .iter()
        .map(|prefix| {
            if prefix.is_empty() {
                PathBuf::from(filename)
            } else {
                Path::new(prefix).join(filename)
            }
        })
        .collect()
}

///
/// Filename-keyed texture memoization. Every distinct name is resolved at most
/// once for the lifetime of the cache (or until [`TextureCache::clear`]); names
/// that fail to resolve are remembered as [`TextureHandle::NONE`]. Handles
/// issued before a clear stop resolving.
///
pub struct TextureCache<D: ImageDecoder, U: TextureUploader> {
    decoder: D,
    uploader: U,
    handles: HashMap<String, TextureHandle>,
    textures: HashMap<TextureHandle, U::Texture>,
    next_id: u32,
}

impl<D: ImageDecoder, U: TextureUploader> TextureCache<D, U> {
    pub fn new(decoder: D, uploader: U) -> Self {
        TextureCache {
            decoder,
            uploader,
            handles: HashMap::new(),
            textures: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn load(&mut self, filename: &str) -> TextureHandle {
        if let Some(handle) = self.handles.get(filename) {
            return *handle;
        }

        let handle = self.resolve(filename);
        self.handles.insert(filename.to_string(), handle);
        handle
    }

    fn resolve(&mut self, filename: &str) -> TextureHandle {
        let mut attempts = Vec::new();

        for path in candidate_paths(filename) {
            match self.decoder.decode(&path) {
                Ok(image) if !image.is_consistent() => {
                    attempts.push(format!("{} (truncated pixel data)", path.display()))
                }
                Ok(image) => {
                    debug!(
                        "Decoded texture {} ({}x{}, {:?})",
                        path.display(),
                        image.width,
                        image.height,
                        image.format
                    );
                    return match self.uploader.upload(&image) {
                        Ok(texture) => {
                            let handle = TextureHandle(self.next_id);
                            self.next_id += 1;
                            self.textures.insert(handle, texture);
                            handle
                        }
                        Err(e) => {
                            error!("Failed to upload texture {}: {e}", path.display());
                            TextureHandle::NONE
                        }
                    };
                }
                Err(e) => attempts.push(format!("{} ({e})", path.display())),
            }
        }

        warn!(
            "Texture '{filename}' not found; tried: {}",
            attempts.join(", ")
        );
        TextureHandle::NONE
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&U::Texture> {
        if handle.is_none() {
            return None;
        }
        self.textures.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Release every texture and forget every name. Ids keep counting up.
    pub fn clear(&mut self) {
        self.handles.clear();
        self.textures.clear();
    }

    pub fn uploader_mut(&mut self) -> &mut U {
        &mut self.uploader
    }
}

/// Uploads decoded images into sampled RGBA8 images and waits for the copy to finish.
pub struct GpuTextureUploader {
    memory_allocator: Arc<StandardMemoryAllocator>,
    command_buffer_allocator: StandardCommandBufferAllocator,
    queue: Arc<Queue>,
}

impl GpuTextureUploader {
    pub fn new(
        device: Arc<Device>,
        memory_allocator: Arc<StandardMemoryAllocator>,
        queue: Arc<Queue>,
    ) -> Self {
        GpuTextureUploader {
            memory_allocator,
            command_buffer_allocator: StandardCommandBufferAllocator::new(
                device,
                StandardCommandBufferAllocatorCreateInfo::default(),
            ),
            queue,
        }
    }
}

impl TextureUploader for GpuTextureUploader {
    type Texture = Arc<ImageView<ImmutableImage>>;

    fn upload(&mut self, image: &DecodedImage) -> Result<Self::Texture> {
        let mut uploads = AutoCommandBufferBuilder::primary(
            &self.command_buffer_allocator,
            self.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .vk("starting texture upload")?;

        let texture = ImmutableImage::from_iter(
            &*self.memory_allocator,
            image.to_rgba8(),
            ImageDimensions::Dim2d {
                width: image.width,
                height: image.height,
                array_layers: 1,
            },
            MipmapsCount::One,
            Format::R8G8B8A8_SRGB,
            &mut uploads,
        )
        .vk("creating texture image")?;

        uploads
            .build()
            .vk("building texture upload")?
            .execute(self.queue.clone())
            .vk("submitting texture upload")?
            .then_signal_fence_and_flush()
            .vk("flushing texture upload")?
            .wait(None)
            .vk("waiting for texture upload")?;

        ImageView::new_default(texture).vk("creating texture view")
    }
}
