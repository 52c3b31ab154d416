//! Image, image view and sampler creation

use ash::{vk, Device};

use crate::render::backends::vulkan::context::{find_memory_type, VulkanError, VulkanResult};
use crate::render::format::{PixelFormat, TextureDimension};
use crate::render::resources::{AddressMode, FilterMode, SamplerDesc, TextureDesc, TextureUsage};
use crate::render::state::ResourceState;

/// Translate an engine pixel format to a Vulkan format.
///
/// Vulkan has no dedicated A8 format; alpha-only textures land in
/// `R8_UNORM` and shaders swizzle.
pub fn to_vk_format(format: PixelFormat) -> vk::Format {
    use PixelFormat::*;
    match format {
        R8Unorm | A8Unorm => vk::Format::R8_UNORM,
        R8G8Unorm => vk::Format::R8G8_UNORM,
        R8G8Snorm => vk::Format::R8G8_SNORM,
        R8G8B8A8Unorm => vk::Format::R8G8B8A8_UNORM,
        R8G8B8A8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        R8G8B8A8Snorm => vk::Format::R8G8B8A8_SNORM,
        B8G8R8A8Unorm | B8G8R8X8Unorm => vk::Format::B8G8R8A8_UNORM,
        B8G8R8A8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        B5G6R5Unorm => vk::Format::B5G6R5_UNORM_PACK16,
        B5G5R5A1Unorm => vk::Format::B5G5R5A1_UNORM_PACK16,
        B4G4R4A4Unorm => vk::Format::B4G4R4A4_UNORM_PACK16,
        R10G10B10A2Unorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        R16Unorm => vk::Format::R16_UNORM,
        R16Float => vk::Format::R16_SFLOAT,
        R16G16Unorm => vk::Format::R16G16_UNORM,
        R16G16Snorm => vk::Format::R16G16_SNORM,
        R16G16Float => vk::Format::R16G16_SFLOAT,
        R16G16B16A16Unorm => vk::Format::R16G16B16A16_UNORM,
        R16G16B16A16Snorm => vk::Format::R16G16B16A16_SNORM,
        R16G16B16A16Float => vk::Format::R16G16B16A16_SFLOAT,
        R32Float => vk::Format::R32_SFLOAT,
        R32G32Float => vk::Format::R32G32_SFLOAT,
        R32G32B32A32Float => vk::Format::R32G32B32A32_SFLOAT,
        R8G8B8G8Unorm => vk::Format::B8G8R8G8_422_UNORM,
        G8R8G8B8Unorm | Yuy2 => vk::Format::G8B8G8R8_422_UNORM,
        Bc1Unorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        Bc1UnormSrgb => vk::Format::BC1_RGBA_SRGB_BLOCK,
        Bc2Unorm => vk::Format::BC2_UNORM_BLOCK,
        Bc2UnormSrgb => vk::Format::BC2_SRGB_BLOCK,
        Bc3Unorm => vk::Format::BC3_UNORM_BLOCK,
        Bc3UnormSrgb => vk::Format::BC3_SRGB_BLOCK,
        Bc4Unorm => vk::Format::BC4_UNORM_BLOCK,
        Bc4Snorm => vk::Format::BC4_SNORM_BLOCK,
        Bc5Unorm => vk::Format::BC5_UNORM_BLOCK,
        Bc5Snorm => vk::Format::BC5_SNORM_BLOCK,
        Bc6hUf16 => vk::Format::BC6H_UFLOAT_BLOCK,
        Bc6hSf16 => vk::Format::BC6H_SFLOAT_BLOCK,
        Bc7Unorm => vk::Format::BC7_UNORM_BLOCK,
        Bc7UnormSrgb => vk::Format::BC7_SRGB_BLOCK,
    }
}

fn to_vk_image_usage(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::RENDER_TARGET) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsage::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    flags
}

fn to_vk_filter(filter: FilterMode) -> vk::Filter {
    match filter {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

fn to_vk_mipmap_mode(filter: FilterMode) -> vk::SamplerMipmapMode {
    match filter {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

fn to_vk_address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

/// Image wrapper owning its memory and default view
pub struct VulkanTexture {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    aspect: vk::ImageAspectFlags,
    extent: vk::Extent3D,
    mip_levels: u32,
    array_layers: u32,
    /// State the caller declared the texture rests in after setup
    pub initial_state: ResourceState,
}

impl VulkanTexture {
    /// Create an image with bound memory and a full-resource view
    pub fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        desc: &TextureDesc,
    ) -> VulkanResult<Self> {
        let image_type = match desc.dimension {
            TextureDimension::D1 => vk::ImageType::TYPE_1D,
            TextureDimension::D2 => vk::ImageType::TYPE_2D,
            TextureDimension::D3 => vk::ImageType::TYPE_3D,
        };
        let extent = vk::Extent3D {
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
        };
        let flags = if desc.cubemap {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        let image_info = vk::ImageCreateInfo::builder()
            .flags(flags)
            .image_type(image_type)
            .format(to_vk_format(desc.format))
            .extent(extent)
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(to_vk_image_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = match find_memory_type(
            memory_properties,
            mem_requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            match device.allocate_memory(&alloc_info, None) {
                Ok(memory) => memory,
                Err(e) => {
                    device.destroy_image(image, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        unsafe {
            if let Err(e) = device.bind_image_memory(image, memory, 0) {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
                return Err(VulkanError::Api(e));
            }
        }

        let aspect = if desc.usage.contains(TextureUsage::DEPTH_STENCIL) {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };

        let view_type = match (desc.dimension, desc.cubemap, desc.array_layers > 1) {
            (TextureDimension::D1, _, _) => vk::ImageViewType::TYPE_1D,
            (TextureDimension::D3, _, _) => vk::ImageViewType::TYPE_3D,
            (TextureDimension::D2, true, _) => vk::ImageViewType::CUBE,
            (TextureDimension::D2, false, true) => vk::ImageViewType::TYPE_2D_ARRAY,
            (TextureDimension::D2, false, false) => vk::ImageViewType::TYPE_2D,
        };

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(view_type)
            .format(to_vk_format(desc.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: desc.mip_levels,
                base_array_layer: 0,
                layer_count: desc.array_layers,
            });

        let view = unsafe {
            match device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        Ok(Self {
            device: device.clone(),
            image,
            memory,
            view,
            aspect,
            extent,
            mip_levels: desc.mip_levels,
            array_layers: desc.array_layers,
            initial_state: desc.initial_state,
        })
    }

    /// Image handle
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Full-resource view
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Aspect mask of the default view
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.aspect
    }

    /// Top-level extent
    pub fn extent(&self) -> vk::Extent3D {
        self.extent
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

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Sampler wrapper
pub struct VulkanSampler {
    device: Device,
    sampler: vk::Sampler,
}

impl VulkanSampler {
    /// Create a sampler from an engine-level description
    pub fn new(device: &Device, desc: &SamplerDesc) -> VulkanResult<Self> {
        let sampler_info = vk::SamplerCreateInfo::builder()
            .min_filter(to_vk_filter(desc.min_filter))
            .mag_filter(to_vk_filter(desc.mag_filter))
            .mipmap_mode(to_vk_mipmap_mode(desc.mip_filter))
            .address_mode_u(to_vk_address_mode(desc.address_u))
            .address_mode_v(to_vk_address_mode(desc.address_v))
            .address_mode_w(to_vk_address_mode(desc.address_w))
            .anisotropy_enable(desc.max_anisotropy > 0.0)
            .max_anisotropy(desc.max_anisotropy.max(1.0))
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE);

        let sampler = unsafe {
            device
                .create_sampler(&sampler_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.clone(),
            sampler,
        })
    }

    /// Sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}
