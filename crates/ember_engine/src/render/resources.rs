//! Backend-neutral resource handles and creation descriptions

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::assets::TextureDescription;
use crate::render::format::{PixelFormat, TextureDimension};
use crate::render::state::ResourceState;

new_key_type! {
    /// Handle to a renderer-owned buffer
    pub struct BufferHandle;
    /// Handle to a renderer-owned texture
    pub struct TextureHandle;
    /// Handle to a renderer-owned sampler
    pub struct SamplerHandle;
    /// Handle to a renderer-owned descriptor set
    pub struct DescriptorSetHandle;
}

bitflags! {
    /// Intended usages of a buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferUsage: u32 {
        /// Bound as a vertex buffer
        const VERTEX = 0x1;
        /// Bound as an index buffer
        const INDEX = 0x2;
        /// Bound as a uniform/constant buffer
        const UNIFORM = 0x4;
        /// Bound as a storage buffer (unordered access)
        const STORAGE = 0x8;
        /// Source of indirect draw arguments
        const INDIRECT = 0x10;
        /// Source of copy operations
        const TRANSFER_SRC = 0x20;
        /// Destination of copy operations
        const TRANSFER_DST = 0x40;
    }
}

bitflags! {
    /// Intended usages of a texture
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextureUsage: u32 {
        /// Sampled in shaders
        const SAMPLED = 0x1;
        /// Read/written through unordered-access views
        const STORAGE = 0x2;
        /// Color render target
        const RENDER_TARGET = 0x4;
        /// Depth-stencil attachment
        const DEPTH_STENCIL = 0x8;
        /// Source of copy operations
        const TRANSFER_SRC = 0x10;
        /// Destination of copy operations
        const TRANSFER_DST = 0x20;
    }
}

/// Which memory pool a resource lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryUsage {
    /// Device-local memory, not host-mappable
    #[default]
    GpuOnly,
    /// Host-writable upload memory
    CpuToGpu,
    /// Host-readable readback memory
    GpuToCpu,
}

/// Description of a buffer to create
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Usage flags
    pub usage: BufferUsage,
    /// Backing memory pool
    pub memory: MemoryUsage,
    /// State the buffer is left in after creation and uploads.
    /// Callers track state from here on.
    pub initial_state: ResourceState,
}

/// Description of a texture to create
#[derive(Debug, Clone, Copy)]
pub struct TextureDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Depth in texels (1 unless 3D)
    pub depth: u32,
    /// Mip levels per slice
    pub mip_levels: u32,
    /// Array slices (6 per cubemap)
    pub array_layers: u32,
    /// Pixel format
    pub format: PixelFormat,
    /// Dimensionality
    pub dimension: TextureDimension,
    /// Whether the texture is a cubemap
    pub cubemap: bool,
    /// Usage flags
    pub usage: TextureUsage,
    /// State the texture is left in after creation and uploads
    pub initial_state: ResourceState,
}

impl TextureDesc {
    /// Build a sampled-texture description from a decoded DDS file.
    ///
    /// Marks the texture as a copy destination so the copy engine can
    /// fill it, with shader-resource as the declared resting state.
    pub fn from_dds(description: &TextureDescription) -> Self {
        Self {
            width: description.width,
            height: description.height,
            depth: description.depth,
            mip_levels: description.mip_levels,
            array_layers: description.array_layers,
            format: description.format,
            dimension: description.dimension,
            cubemap: description.cubemap,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
            initial_state: ResourceState::SHADER_RESOURCE,
        }
    }
}

/// Texel filtering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Nearest-neighbor
    Nearest,
    /// Linear interpolation
    #[default]
    Linear,
}

/// Texture coordinate addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    /// Wrap around
    #[default]
    Repeat,
    /// Mirror on each repeat
    MirrorRepeat,
    /// Clamp to the edge texel
    ClampToEdge,
    /// Clamp to the border color
    ClampToBorder,
}

/// Description of a sampler to create
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplerDesc {
    /// Minification filter
    pub min_filter: FilterMode,
    /// Magnification filter
    pub mag_filter: FilterMode,
    /// Filter between mip levels
    pub mip_filter: FilterMode,
    /// Addressing along U
    pub address_u: AddressMode,
    /// Addressing along V
    pub address_v: AddressMode,
    /// Addressing along W
    pub address_w: AddressMode,
    /// Maximum anisotropy; zero disables anisotropic filtering
    pub max_anisotropy: f32,
}
