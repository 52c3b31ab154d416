//! Buffer creation and memory management
//!
//! RAII wrappers; every buffer owns its device memory and frees both
//! on drop.

use ash::{vk, Device};

use crate::render::backends::vulkan::context::{find_memory_type, VulkanError, VulkanResult};
use crate::render::resources::{BufferUsage, MemoryUsage};
use crate::render::state::ResourceState;

/// Translate engine buffer usage to Vulkan usage flags
pub fn to_vk_buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::INDIRECT) {
        flags |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    flags
}

fn memory_property_flags(memory: MemoryUsage) -> vk::MemoryPropertyFlags {
    match memory {
        MemoryUsage::GpuOnly => vk::MemoryPropertyFlags::DEVICE_LOCAL,
        MemoryUsage::CpuToGpu | MemoryUsage::GpuToCpu => {
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
        }
    }
}

/// Buffer wrapper with memory management
pub struct VulkanBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    /// State the caller declared the buffer rests in after setup
    pub initial_state: ResourceState,
}

impl VulkanBuffer {
    /// Create a buffer with bound memory
    pub fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        initial_state: ResourceState,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = match find_memory_type(
            memory_properties,
            mem_requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
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
                    device.destroy_buffer(buffer, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        unsafe {
            if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
                return Err(VulkanError::Api(e));
            }
        }

        Ok(Self {
            device: device.clone(),
            buffer,
            memory,
            size,
            initial_state,
        })
    }

    /// Create a buffer from an engine-level description
    pub fn from_desc(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        desc: &crate::render::resources::BufferDesc,
    ) -> VulkanResult<Self> {
        Self::new(
            device,
            memory_properties,
            desc.size,
            to_vk_buffer_usage(desc.usage),
            memory_property_flags(desc.memory),
            desc.initial_state,
        )
    }

    /// Create a host-visible staging buffer for one transfer
    pub fn staging(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        Self::new(
            device,
            memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ResourceState::COPY_SOURCE,
        )
    }

    /// Map, copy the bytes in, unmap
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        debug_assert!(bytes.len() as vk::DeviceSize <= self.size);
        unsafe {
            let data_ptr = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), data_ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
