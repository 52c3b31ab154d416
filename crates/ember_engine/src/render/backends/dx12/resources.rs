//! Committed resources and format/sampler translation
//!
//! Every buffer and texture is its own committed allocation. Default
//! heap resources start in `COMMON` and rely on promotion for their
//! first use; upload and readback heaps have the fixed states D3D12
//! requires of them.

use windows::Win32::Graphics::Direct3D12::{
    ID3D12Device, ID3D12Resource, D3D12_CPU_PAGE_PROPERTY_UNKNOWN, D3D12_FILTER,
    D3D12_FILTER_ANISOTROPIC, D3D12_HEAP_FLAG_NONE, D3D12_HEAP_PROPERTIES, D3D12_HEAP_TYPE,
    D3D12_HEAP_TYPE_DEFAULT, D3D12_HEAP_TYPE_READBACK, D3D12_HEAP_TYPE_UPLOAD,
    D3D12_MEMORY_POOL_UNKNOWN, D3D12_RESOURCE_DESC, D3D12_RESOURCE_DIMENSION_BUFFER,
    D3D12_RESOURCE_DIMENSION_TEXTURE1D, D3D12_RESOURCE_DIMENSION_TEXTURE2D,
    D3D12_RESOURCE_DIMENSION_TEXTURE3D, D3D12_RESOURCE_FLAGS, D3D12_RESOURCE_FLAG_NONE,
    D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL, D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET,
    D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS, D3D12_RESOURCE_STATES,
    D3D12_RESOURCE_STATE_COMMON, D3D12_RESOURCE_STATE_COPY_DEST,
    D3D12_RESOURCE_STATE_GENERIC_READ, D3D12_SAMPLER_DESC, D3D12_TEXTURE_ADDRESS_MODE,
    D3D12_TEXTURE_ADDRESS_MODE_BORDER, D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
    D3D12_TEXTURE_ADDRESS_MODE_MIRROR, D3D12_TEXTURE_ADDRESS_MODE_WRAP,
    D3D12_TEXTURE_LAYOUT_ROW_MAJOR, D3D12_TEXTURE_LAYOUT_UNKNOWN,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT, DXGI_FORMAT_A8_UNORM, DXGI_FORMAT_B4G4R4A4_UNORM, DXGI_FORMAT_B5G5R5A1_UNORM,
    DXGI_FORMAT_B5G6R5_UNORM, DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
    DXGI_FORMAT_B8G8R8X8_UNORM, DXGI_FORMAT_BC1_UNORM, DXGI_FORMAT_BC1_UNORM_SRGB,
    DXGI_FORMAT_BC2_UNORM, DXGI_FORMAT_BC2_UNORM_SRGB, DXGI_FORMAT_BC3_UNORM,
    DXGI_FORMAT_BC3_UNORM_SRGB, DXGI_FORMAT_BC4_SNORM, DXGI_FORMAT_BC4_UNORM,
    DXGI_FORMAT_BC5_SNORM, DXGI_FORMAT_BC5_UNORM, DXGI_FORMAT_BC6H_SF16, DXGI_FORMAT_BC6H_UF16,
    DXGI_FORMAT_BC7_UNORM, DXGI_FORMAT_BC7_UNORM_SRGB, DXGI_FORMAT_G8R8_G8B8_UNORM,
    DXGI_FORMAT_R10G10B10A2_UNORM, DXGI_FORMAT_R16G16B16A16_FLOAT,
    DXGI_FORMAT_R16G16B16A16_SNORM, DXGI_FORMAT_R16G16B16A16_UNORM, DXGI_FORMAT_R16G16_FLOAT,
    DXGI_FORMAT_R16G16_SNORM, DXGI_FORMAT_R16G16_UNORM, DXGI_FORMAT_R16_FLOAT,
    DXGI_FORMAT_R16_UNORM, DXGI_FORMAT_R32G32B32A32_FLOAT, DXGI_FORMAT_R32G32_FLOAT,
    DXGI_FORMAT_R32_FLOAT, DXGI_FORMAT_R8G8B8A8_SNORM, DXGI_FORMAT_R8G8B8A8_UNORM,
    DXGI_FORMAT_R8G8B8A8_UNORM_SRGB, DXGI_FORMAT_R8G8_B8G8_UNORM, DXGI_FORMAT_R8G8_SNORM,
    DXGI_FORMAT_R8G8_UNORM, DXGI_FORMAT_R8_UNORM, DXGI_FORMAT_UNKNOWN, DXGI_FORMAT_YUY2,
    DXGI_SAMPLE_DESC,
};

use crate::render::backends::dx12::device::{Dx12Error, Dx12Result};
use crate::render::format::PixelFormat;
use crate::render::resources::{
    AddressMode, BufferDesc, FilterMode, MemoryUsage, SamplerDesc, TextureDesc, TextureUsage,
};
use crate::render::state::ResourceState;
use crate::render::TextureDimension;

/// Translate an engine pixel format to a DXGI format
pub fn to_dxgi_format(format: PixelFormat) -> DXGI_FORMAT {
    use PixelFormat::*;
    match format {
        R8Unorm => DXGI_FORMAT_R8_UNORM,
        A8Unorm => DXGI_FORMAT_A8_UNORM,
        R8G8Unorm => DXGI_FORMAT_R8G8_UNORM,
        R8G8Snorm => DXGI_FORMAT_R8G8_SNORM,
        R8G8B8A8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
        R8G8B8A8UnormSrgb => DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
        R8G8B8A8Snorm => DXGI_FORMAT_R8G8B8A8_SNORM,
        B8G8R8A8Unorm => DXGI_FORMAT_B8G8R8A8_UNORM,
        B8G8R8A8UnormSrgb => DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
        B8G8R8X8Unorm => DXGI_FORMAT_B8G8R8X8_UNORM,
        B5G6R5Unorm => DXGI_FORMAT_B5G6R5_UNORM,
        B5G5R5A1Unorm => DXGI_FORMAT_B5G5R5A1_UNORM,
        B4G4R4A4Unorm => DXGI_FORMAT_B4G4R4A4_UNORM,
        R10G10B10A2Unorm => DXGI_FORMAT_R10G10B10A2_UNORM,
        R16Unorm => DXGI_FORMAT_R16_UNORM,
        R16Float => DXGI_FORMAT_R16_FLOAT,
        R16G16Unorm => DXGI_FORMAT_R16G16_UNORM,
        R16G16Snorm => DXGI_FORMAT_R16G16_SNORM,
        R16G16Float => DXGI_FORMAT_R16G16_FLOAT,
        R16G16B16A16Unorm => DXGI_FORMAT_R16G16B16A16_UNORM,
        R16G16B16A16Snorm => DXGI_FORMAT_R16G16B16A16_SNORM,
        R16G16B16A16Float => DXGI_FORMAT_R16G16B16A16_FLOAT,
        R32Float => DXGI_FORMAT_R32_FLOAT,
        R32G32Float => DXGI_FORMAT_R32G32_FLOAT,
        R32G32B32A32Float => DXGI_FORMAT_R32G32B32A32_FLOAT,
        R8G8B8G8Unorm => DXGI_FORMAT_R8G8_B8G8_UNORM,
        G8R8G8B8Unorm => DXGI_FORMAT_G8R8_G8B8_UNORM,
        Yuy2 => DXGI_FORMAT_YUY2,
        Bc1Unorm => DXGI_FORMAT_BC1_UNORM,
        Bc1UnormSrgb => DXGI_FORMAT_BC1_UNORM_SRGB,
        Bc2Unorm => DXGI_FORMAT_BC2_UNORM,
        Bc2UnormSrgb => DXGI_FORMAT_BC2_UNORM_SRGB,
        Bc3Unorm => DXGI_FORMAT_BC3_UNORM,
        Bc3UnormSrgb => DXGI_FORMAT_BC3_UNORM_SRGB,
        Bc4Unorm => DXGI_FORMAT_BC4_UNORM,
        Bc4Snorm => DXGI_FORMAT_BC4_SNORM,
        Bc5Unorm => DXGI_FORMAT_BC5_UNORM,
        Bc5Snorm => DXGI_FORMAT_BC5_SNORM,
        Bc6hUf16 => DXGI_FORMAT_BC6H_UF16,
        Bc6hSf16 => DXGI_FORMAT_BC6H_SF16,
        Bc7Unorm => DXGI_FORMAT_BC7_UNORM,
        Bc7UnormSrgb => DXGI_FORMAT_BC7_UNORM_SRGB,
    }
}

fn to_address_mode(mode: AddressMode) -> D3D12_TEXTURE_ADDRESS_MODE {
    match mode {
        AddressMode::Repeat => D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        AddressMode::MirrorRepeat => D3D12_TEXTURE_ADDRESS_MODE_MIRROR,
        AddressMode::ClampToEdge => D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
        AddressMode::ClampToBorder => D3D12_TEXTURE_ADDRESS_MODE_BORDER,
    }
}

fn to_filter(desc: &SamplerDesc) -> D3D12_FILTER {
    if desc.max_anisotropy > 0.0 {
        return D3D12_FILTER_ANISOTROPIC;
    }
    // D3D12 basic filter encoding: min at bit 4, mag at bit 2, mip
    // at bit 0, linear = 1
    let bit = |filter: FilterMode| match filter {
        FilterMode::Nearest => 0,
        FilterMode::Linear => 1,
    };
    D3D12_FILTER(bit(desc.min_filter) << 4 | bit(desc.mag_filter) << 2 | bit(desc.mip_filter))
}

/// Translate an engine sampler description to D3D12's
pub fn to_sampler_desc(desc: &SamplerDesc) -> D3D12_SAMPLER_DESC {
    D3D12_SAMPLER_DESC {
        Filter: to_filter(desc),
        AddressU: to_address_mode(desc.address_u),
        AddressV: to_address_mode(desc.address_v),
        AddressW: to_address_mode(desc.address_w),
        MipLODBias: 0.0,
        MaxAnisotropy: desc.max_anisotropy as u32,
        ComparisonFunc: Default::default(),
        BorderColor: [0.0; 4],
        MinLOD: 0.0,
        MaxLOD: f32::MAX,
    }
}

fn heap_properties(kind: D3D12_HEAP_TYPE) -> D3D12_HEAP_PROPERTIES {
    D3D12_HEAP_PROPERTIES {
        Type: kind,
        CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
        MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
        CreationNodeMask: 0,
        VisibleNodeMask: 0,
    }
}

/// Create a committed buffer on the given heap type
pub fn alloc_buffer(
    device: &ID3D12Device,
    heap: D3D12_HEAP_TYPE,
    size: u64,
    initial: D3D12_RESOURCE_STATES,
    flags: D3D12_RESOURCE_FLAGS,
) -> Dx12Result<ID3D12Resource> {
    let desc = D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Alignment: 0,
        Width: size,
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        Format: DXGI_FORMAT_UNKNOWN,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        Flags: flags,
    };

    let mut buffer = None;
    unsafe {
        device.CreateCommittedResource(
            &heap_properties(heap),
            D3D12_HEAP_FLAG_NONE,
            &desc,
            initial,
            None,
            &mut buffer,
        )?;
    }
    buffer.ok_or_else(|| Dx12Error::InvalidOperation {
        reason: "CreateCommittedResource returned no resource".to_string(),
    })
}

/// Committed buffer resource
pub struct Dx12Buffer {
    resource: ID3D12Resource,
    size: u64,
    memory: MemoryUsage,
    /// State the caller declared the buffer rests in after setup
    pub initial_state: ResourceState,
}

impl Dx12Buffer {
    /// Create a buffer from an engine-level description
    pub fn new(device: &ID3D12Device, desc: &BufferDesc) -> Dx12Result<Self> {
        // Upload and readback heaps have states D3D12 fixes for the
        // resource's whole lifetime
        let (heap, native_state) = match desc.memory {
            MemoryUsage::GpuOnly => (D3D12_HEAP_TYPE_DEFAULT, D3D12_RESOURCE_STATE_COMMON),
            MemoryUsage::CpuToGpu => (D3D12_HEAP_TYPE_UPLOAD, D3D12_RESOURCE_STATE_GENERIC_READ),
            MemoryUsage::GpuToCpu => (D3D12_HEAP_TYPE_READBACK, D3D12_RESOURCE_STATE_COPY_DEST),
        };
        let flags = if desc
            .usage
            .contains(crate::render::resources::BufferUsage::STORAGE)
        {
            D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS
        } else {
            D3D12_RESOURCE_FLAG_NONE
        };

        let resource = alloc_buffer(device, heap, desc.size, native_state, flags)?;
        Ok(Self {
            resource,
            size: desc.size,
            memory: desc.memory,
            initial_state: desc.initial_state,
        })
    }

    /// Native resource
    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Heap class the buffer was allocated on
    pub fn memory(&self) -> MemoryUsage {
        self.memory
    }
}

/// Committed texture resource
pub struct Dx12Texture {
    resource: ID3D12Resource,
    format: DXGI_FORMAT,
    mip_levels: u32,
    array_layers: u32,
    /// State the caller declared the texture rests in after setup
    pub initial_state: ResourceState,
}

impl Dx12Texture {
    /// Create a texture from an engine-level description
    pub fn new(device: &ID3D12Device, desc: &TextureDesc) -> Dx12Result<Self> {
        let dimension = match desc.dimension {
            TextureDimension::D1 => D3D12_RESOURCE_DIMENSION_TEXTURE1D,
            TextureDimension::D2 => D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            TextureDimension::D3 => D3D12_RESOURCE_DIMENSION_TEXTURE3D,
        };
        let depth_or_layers = if desc.dimension == TextureDimension::D3 {
            desc.depth
        } else {
            desc.array_layers
        } as u16;

        let mut flags = D3D12_RESOURCE_FLAG_NONE;
        if desc.usage.contains(TextureUsage::RENDER_TARGET) {
            flags |= D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET;
        }
        if desc.usage.contains(TextureUsage::DEPTH_STENCIL) {
            flags |= D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL;
        }
        if desc.usage.contains(TextureUsage::STORAGE) {
            flags |= D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS;
        }

        let format = to_dxgi_format(desc.format);
        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: dimension,
            Alignment: 0,
            Width: desc.width as u64,
            Height: desc.height,
            DepthOrArraySize: depth_or_layers,
            MipLevels: desc.mip_levels as u16,
            Format: format,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: flags,
        };

        let mut resource = None;
        unsafe {
            device.CreateCommittedResource(
                &heap_properties(D3D12_HEAP_TYPE_DEFAULT),
                D3D12_HEAP_FLAG_NONE,
                &resource_desc,
                D3D12_RESOURCE_STATE_COMMON,
                None,
                &mut resource,
            )?;
        }

        let resource = resource.ok_or_else(|| Dx12Error::InvalidOperation {
            reason: "CreateCommittedResource returned no resource".to_string(),
        })?;

        Ok(Self {
            resource,
            format,
            mip_levels: desc.mip_levels,
            array_layers: desc.array_layers,
            initial_state: desc.initial_state,
        })
    }

    /// Native resource
    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }

    /// DXGI format the texture was created with
    pub fn format(&self) -> DXGI_FORMAT {
        self.format
    }

    /// Mip level count
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Array layer count
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }
}

/// Sampler state awaiting a heap slot; D3D12 samplers only exist as
/// descriptors
pub struct Dx12Sampler {
    desc: D3D12_SAMPLER_DESC,
}

impl Dx12Sampler {
    /// Translate and store the description
    pub fn new(desc: &SamplerDesc) -> Self {
        Self {
            desc: to_sampler_desc(desc),
        }
    }

    /// The translated description
    pub fn desc(&self) -> &D3D12_SAMPLER_DESC {
        &self.desc
    }
}
