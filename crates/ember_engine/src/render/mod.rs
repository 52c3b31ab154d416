//! Rendering system: shared vocabulary, backend dispatch and the two
//! native backends

pub mod backend;
pub mod backends;
pub mod binding;
pub mod format;
pub mod resources;
pub mod state;

use thiserror::Error;

pub use backend::{
    create_renderer, BackendResult, GraphicsApi, QueueKind, RenderBackend, ResourceRef,
    ResourceTransition, SurfaceProvider,
};
pub use binding::{binding_slots, DescriptorUpdate, DescriptorWrite, UpdateFrequency};
pub use format::{PixelFormat, SurfaceLayout, TextureDimension};
pub use resources::{
    AddressMode, BufferDesc, BufferHandle, BufferUsage, DescriptorSetHandle, FilterMode,
    MemoryUsage, SamplerDesc, SamplerHandle, TextureDesc, TextureHandle, TextureUsage,
};
pub use state::ResourceState;

/// Top-level rendering error type
#[derive(Debug, Error)]
pub enum RenderError {
    /// Vulkan backend failure
    #[error(transparent)]
    Vulkan(#[from] backends::vulkan::VulkanError),

    /// DirectX 12 backend failure
    #[cfg(windows)]
    #[error(transparent)]
    Dx12(#[from] backends::dx12::Dx12Error),

    /// Texture decode failure
    #[error(transparent)]
    Decode(#[from] crate::assets::DdsError),

    /// Descriptor heap or pool slot exhaustion
    #[error(transparent)]
    Descriptor(#[from] crate::util::IndexPoolError),

    /// The requested backend cannot run on this platform
    #[error("backend {0:?} is not supported on this platform")]
    UnsupportedBackend(GraphicsApi),

    /// A handle referenced a destroyed or foreign resource
    #[error("unknown resource handle")]
    UnknownHandle,

    /// A state mask broke the exclusive-state invariant
    #[error("invalid resource state combination: {0:?}")]
    InvalidState(ResourceState),

    /// The renderer was built without a presentation surface
    #[error("renderer has no surface to present to")]
    NoSurface,
}
