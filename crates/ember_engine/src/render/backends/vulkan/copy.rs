//! Synchronous copy engine on the transfer queue
//!
//! One command buffer, one fence, one upload in flight at a time.
//! Every upload allocates a staging buffer sized exactly to the
//! payload, records the copy, submits and blocks until the fence
//! signals, then frees the staging buffer. Unbounded waits; a hung
//! transfer hangs the calling thread. The destination is left in the
//! copy-destination state; the renderer records the transition to
//! its declared resting state on the graphics queue.
//!
//! Destinations use exclusive sharing, and no queue-family ownership
//! transfer is recorded when the transfer family differs from the
//! graphics family: barriers use ignored family indices and ordering
//! comes from the host fence wait between the queues. Known
//! limitation; a strict reading of exclusive ownership would need a
//! release/acquire pair here.
//!
//! Simplicity over throughput: uploads happen at load time, not in
//! the frame loop, so there is no ring buffer and no batching.

use ash::{vk, Device};

use crate::assets::TextureDescription;
use crate::render::backend::QueueKind;
use crate::render::backends::vulkan::barrier::{plan_barriers, record_barriers, BarrierTarget};
use crate::render::backends::vulkan::buffer::VulkanBuffer;
use crate::render::backends::vulkan::context::{QueueInfo, VulkanError, VulkanResult};
use crate::render::backends::vulkan::texture::VulkanTexture;
use crate::render::state::ResourceState;

/// Staging-upload engine bound to one queue
pub struct CopyEngine {
    device: Device,
    queue: QueueInfo,
    pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
}

impl CopyEngine {
    /// Create the command pool, command buffer and fence
    pub fn new(device: &Device, queue: QueueInfo) -> VulkanResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue.family);
        let pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe {
            match device.allocate_command_buffers(&alloc_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    device.destroy_command_pool(pool, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        let fence = unsafe {
            match device.create_fence(&vk::FenceCreateInfo::builder(), None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.destroy_command_pool(pool, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        Ok(Self {
            device: device.clone(),
            queue,
            pool,
            command_buffer,
            fence,
        })
    }

    /// Copy bytes into a device-local buffer through a staging buffer.
    ///
    /// The destination is left in the copy-destination state; the
    /// renderer moves it to its declared resting state on the
    /// graphics queue afterwards. Empty payloads are a no-op.
    pub fn upload_buffer(
        &self,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        dst: &VulkanBuffer,
        bytes: &[u8],
    ) -> VulkanResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        if bytes.len() as vk::DeviceSize > dst.size() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "upload of {} bytes exceeds buffer size {}",
                    bytes.len(),
                    dst.size()
                ),
            });
        }

        let staging = VulkanBuffer::staging(&self.device, memory_properties, bytes.len() as u64)?;
        staging.write_bytes(bytes)?;

        self.record_and_submit(|device, cmd| {
            let to_copy = plan_barriers(
                &[
                    (
                        BarrierTarget::Buffer {
                            buffer: staging.handle(),
                            size: staging.size(),
                        },
                        ResourceState::COMMON,
                        ResourceState::COPY_SOURCE,
                    ),
                    (
                        BarrierTarget::Buffer {
                            buffer: dst.handle(),
                            size: dst.size(),
                        },
                        ResourceState::COMMON,
                        ResourceState::COPY_DEST,
                    ),
                ],
                QueueKind::Transfer,
            );
            record_barriers(device, cmd, &to_copy);

            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: bytes.len() as vk::DeviceSize,
            };
            unsafe {
                device.cmd_copy_buffer(cmd, staging.handle(), dst.handle(), &[region]);
            }
        })
        // staging dropped here, after the fence wait inside
    }

    /// Copy decoded texture data into an image, one region per
    /// (slice, mip) record, through a single staging buffer.
    ///
    /// The image is transitioned from its undefined initial layout to
    /// the copy-destination layout and filled; the renderer moves it
    /// to its declared resting state on the graphics queue afterwards.
    pub fn upload_texture(
        &self,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        dst: &VulkanTexture,
        description: &TextureDescription,
        bytes: &[u8],
    ) -> VulkanResult<()> {
        let data_len = description.data_len();
        if data_len == 0 {
            return Ok(());
        }

        // Pack the image payloads contiguously into staging; the
        // source ranges need not be contiguous in the file buffer
        let mut staged = Vec::with_capacity(data_len);
        let mut regions = Vec::with_capacity(description.images.len());
        for image in &description.images {
            let end = image.offset + image.len;
            if end > bytes.len() {
                return Err(VulkanError::InvalidOperation {
                    reason: format!(
                        "image range {}..{} exceeds source buffer of {} bytes",
                        image.offset,
                        end,
                        bytes.len()
                    ),
                });
            }
            regions.push(
                vk::BufferImageCopy::builder()
                    .buffer_offset(staged.len() as vk::DeviceSize)
                    .buffer_row_length(0)
                    .buffer_image_height(0)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: dst.aspect(),
                        mip_level: image.mip_level,
                        base_array_layer: image.array_layer,
                        layer_count: 1,
                    })
                    .image_extent(vk::Extent3D {
                        width: image.width,
                        height: image.height,
                        depth: image.depth,
                    })
                    .build(),
            );
            staged.extend_from_slice(&bytes[image.offset..end]);
        }

        let staging = VulkanBuffer::staging(&self.device, memory_properties, staged.len() as u64)?;
        staging.write_bytes(&staged)?;

        let target = BarrierTarget::Image {
            image: dst.image(),
            aspect: dst.aspect(),
            mip_levels: dst.mip_levels(),
            array_layers: dst.array_layers(),
        };

        self.record_and_submit(|device, cmd| {
            let to_copy = plan_barriers(
                &[
                    (
                        BarrierTarget::Buffer {
                            buffer: staging.handle(),
                            size: staging.size(),
                        },
                        ResourceState::COMMON,
                        ResourceState::COPY_SOURCE,
                    ),
                    (target, ResourceState::COMMON, ResourceState::COPY_DEST),
                ],
                QueueKind::Transfer,
            );
            record_barriers(device, cmd, &to_copy);

            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    staging.handle(),
                    dst.image(),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &regions,
                );
            }
        })
    }

    /// Record one command buffer, submit it and block on the fence
    fn record_and_submit<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        record(&self.device, self.command_buffer);

        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::Api)?;

            let command_buffers = [self.command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
            self.device
                .queue_submit(self.queue.queue, &[submit_info.build()], self.fence)
                .map_err(VulkanError::Api)?;
            self.device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(VulkanError::Api)?;
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)?;
        }
        Ok(())
    }
}

impl Drop for CopyEngine {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
