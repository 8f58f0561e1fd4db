use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Error, Debug)]
pub enum RenderError {
    /// A vulkano call failed. `context` names the operation that was attempted.
    #[error("vulkan error while {context}: {source}")]
    Vulkan {
        context: &'static str,
        source: Box<dyn std::error::Error>,
    },

    #[error("shader for program `{program}` has no `main` entry point")]
    MissingEntryPoint { program: &'static str },

    /// A descriptor slot the program relies on was stripped or declared with another type.
    #[error("program `{program}` is missing required slot `{slot}` (set {set}, binding {binding})")]
    MissingSlot {
        program: &'static str,
        slot: &'static str,
        set: u32,
        binding: u32,
    },

    #[error("shadow map framebuffer is incomplete: {0}")]
    IncompleteShadowTarget(String),

    #[error("mesh `{0}` has no vertices")]
    EmptyMesh(String),

    #[error("failed to load model {path}: {source}")]
    ModelLoad {
        path: String,
        source: tobj::LoadError,
    },

    #[error("no suitable vulkan device found")]
    NoDevice,

    #[error("surface is not backed by a winit window")]
    NoWindow,
}

/// Attaches an operation name to any vulkano error.
pub trait VulkanContext<T> {
    fn vk(self, context: &'static str) -> Result<T>;
}

impl<T, E> VulkanContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + 'static,
{
    fn vk(self, context: &'static str) -> Result<T> {
        self.map_err(|source| RenderError::Vulkan {
            context,
            source: Box::new(source),
        })
    }
}
