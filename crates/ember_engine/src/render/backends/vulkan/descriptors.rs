//! Descriptor pool and per-frequency set layouts
//!
//! One pool serves every set; it is created once with fixed
//! capacities from the renderer configuration and never grows.
//! Exceeding the pool is reported as an error, not handled by
//! chaining pools. Sets are freed individually back to the pool.
//!
//! Each update frequency has its own set layout with a fixed binding
//! scheme: uniform buffers at 0, storage buffers at 1, sampled
//! images at 2, storage images at 3. The sampler partition holds
//! samplers at binding 0 only.

use ash::{vk, Device};

use crate::config::RendererConfig;
use crate::render::backends::vulkan::context::{VulkanError, VulkanResult};
use crate::render::binding::UpdateFrequency;

/// Binding number for uniform buffers in resource-partition layouts
pub const BINDING_UNIFORM: u32 = 0;
/// Binding number for storage buffers
pub const BINDING_STORAGE: u32 = 1;
/// Binding number for sampled images
pub const BINDING_SAMPLED: u32 = 2;
/// Binding number for storage images
pub const BINDING_STORAGE_IMAGE: u32 = 3;

const DESCRIPTORS_PER_BINDING: u32 = 8;

/// A descriptor write with native handles already resolved
pub enum ResolvedUpdate {
    /// Uniform buffer range
    UniformBuffer(vk::DescriptorBufferInfo),
    /// Storage buffer range
    StorageBuffer(vk::DescriptorBufferInfo),
    /// Sampled image in shader-read layout
    SampledTexture(vk::ImageView),
    /// Storage image in general layout
    StorageTexture(vk::ImageView),
    /// Sampler
    Sampler(vk::Sampler),
}

/// A resolved write targeting one binding of a set
pub struct ResolvedWrite {
    /// Binding number
    pub binding: u32,
    /// Array element
    pub array_element: u32,
    /// Resolved resource
    pub update: ResolvedUpdate,
}

/// Owns the pool and the four frequency layouts
pub struct DescriptorAllocator {
    device: Device,
    pool: vk::DescriptorPool,
    layouts: [vk::DescriptorSetLayout; UpdateFrequency::COUNT],
}

impl DescriptorAllocator {
    /// Create the pool and per-frequency layouts
    pub fn new(device: &Device, config: &RendererConfig) -> VulkanResult<Self> {
        let capacities = &config.descriptors;
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: capacities.shader_visible,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: capacities.shader_visible,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLED_IMAGE,
                descriptor_count: capacities.shader_visible,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: capacities.shader_visible,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLER,
                descriptor_count: capacities.shader_visible_sampler,
            },
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(config.max_descriptor_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe {
            device
                .create_descriptor_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let mut layouts = [vk::DescriptorSetLayout::null(); UpdateFrequency::COUNT];
        for frequency in UpdateFrequency::ALL {
            let layout = match Self::create_layout(device, frequency) {
                Ok(layout) => layout,
                Err(e) => {
                    unsafe {
                        for layout in layouts.iter().filter(|l| **l != vk::DescriptorSetLayout::null())
                        {
                            device.destroy_descriptor_set_layout(*layout, None);
                        }
                        device.destroy_descriptor_pool(pool, None);
                    }
                    return Err(e);
                }
            };
            layouts[frequency.index()] = layout;
        }

        Ok(Self {
            device: device.clone(),
            pool,
            layouts,
        })
    }

    fn create_layout(
        device: &Device,
        frequency: UpdateFrequency,
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = if frequency == UpdateFrequency::Sampler
        {
            vec![vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::SAMPLER)
                .descriptor_count(DESCRIPTORS_PER_BINDING)
                .stage_flags(vk::ShaderStageFlags::ALL)
                .build()]
        } else {
            [
                (BINDING_UNIFORM, vk::DescriptorType::UNIFORM_BUFFER),
                (BINDING_STORAGE, vk::DescriptorType::STORAGE_BUFFER),
                (BINDING_SAMPLED, vk::DescriptorType::SAMPLED_IMAGE),
                (BINDING_STORAGE_IMAGE, vk::DescriptorType::STORAGE_IMAGE),
            ]
            .into_iter()
            .map(|(binding, ty)| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(binding)
                    .descriptor_type(ty)
                    .descriptor_count(DESCRIPTORS_PER_BINDING)
                    .stage_flags(vk::ShaderStageFlags::ALL)
                    .build()
            })
            .collect()
        };

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Layout for one update frequency
    pub fn layout(&self, frequency: UpdateFrequency) -> vk::DescriptorSetLayout {
        self.layouts[frequency.index()]
    }

    /// Allocate one set from the pool
    pub fn create_set(&self, frequency: UpdateFrequency) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [self.layout(frequency)];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(VulkanError::Api)?
        };
        Ok(sets[0])
    }

    /// Return a set to the pool
    pub fn free_set(&self, set: vk::DescriptorSet) -> VulkanResult<()> {
        unsafe {
            self.device
                .free_descriptor_sets(self.pool, &[set])
                .map_err(VulkanError::Api)
        }
    }

    /// Apply resolved writes to a set in one call.
    ///
    /// Buffer/image info structs must outlive the write array, so
    /// they are staged in vectors whose addresses stay stable while
    /// the writes are built.
    pub fn write_set(&self, set: vk::DescriptorSet, writes: &[ResolvedWrite]) {
        if writes.is_empty() {
            return;
        }

        let mut buffer_infos = Vec::with_capacity(writes.len());
        let mut image_infos = Vec::with_capacity(writes.len());
        for write in writes {
            match &write.update {
                ResolvedUpdate::UniformBuffer(info) | ResolvedUpdate::StorageBuffer(info) => {
                    buffer_infos.push(*info);
                }
                ResolvedUpdate::SampledTexture(view) => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: *view,
                        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    });
                }
                ResolvedUpdate::StorageTexture(view) => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: *view,
                        image_layout: vk::ImageLayout::GENERAL,
                    });
                }
                ResolvedUpdate::Sampler(sampler) => {
                    image_infos.push(vk::DescriptorImageInfo {
                        sampler: *sampler,
                        image_view: vk::ImageView::null(),
                        image_layout: vk::ImageLayout::UNDEFINED,
                    });
                }
            }
        }

        let mut vk_writes = Vec::with_capacity(writes.len());
        let mut next_buffer = 0;
        let mut next_image = 0;
        for write in writes {
            let builder = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(write.binding)
                .dst_array_element(write.array_element);
            let built = match &write.update {
                ResolvedUpdate::UniformBuffer(_) => {
                    let info = &buffer_infos[next_buffer..next_buffer + 1];
                    next_buffer += 1;
                    builder
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(info)
                        .build()
                }
                ResolvedUpdate::StorageBuffer(_) => {
                    let info = &buffer_infos[next_buffer..next_buffer + 1];
                    next_buffer += 1;
                    builder
                        .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                        .buffer_info(info)
                        .build()
                }
                ResolvedUpdate::SampledTexture(_) => {
                    let info = &image_infos[next_image..next_image + 1];
                    next_image += 1;
                    builder
                        .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                        .image_info(info)
                        .build()
                }
                ResolvedUpdate::StorageTexture(_) => {
                    let info = &image_infos[next_image..next_image + 1];
                    next_image += 1;
                    builder
                        .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                        .image_info(info)
                        .build()
                }
                ResolvedUpdate::Sampler(_) => {
                    let info = &image_infos[next_image..next_image + 1];
                    next_image += 1;
                    builder
                        .descriptor_type(vk::DescriptorType::SAMPLER)
                        .image_info(info)
                        .build()
                }
            };
            vk_writes.push(built);
        }

        unsafe {
            self.device.update_descriptor_sets(&vk_writes, &[]);
        }
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        unsafe {
            for layout in self.layouts {
                self.device.destroy_descriptor_set_layout(layout, None);
            }
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
