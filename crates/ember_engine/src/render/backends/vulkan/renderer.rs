//! Vulkan implementation of the render backend trait
//!
//! Owns every native resource behind slotmap handles. Submission is
//! synchronous: `submit` blocks on a fence before recording resumes,
//! so there is never more than one command buffer in flight on the
//! graphics queue.

use ash::vk;
use slotmap::SlotMap;

use crate::assets::TextureDescription;
use crate::config::RendererConfig;
use crate::render::backend::{
    BackendResult, GraphicsApi, QueueKind, RenderBackend, ResourceRef, ResourceTransition,
    SurfaceProvider,
};
use crate::render::backends::vulkan::barrier::{plan_barriers, record_barriers, BarrierTarget};
use crate::render::backends::vulkan::buffer::VulkanBuffer;
use crate::render::backends::vulkan::context::{VulkanContext, VulkanError};
use crate::render::backends::vulkan::copy::CopyEngine;
use crate::render::backends::vulkan::descriptors::{
    DescriptorAllocator, ResolvedUpdate, ResolvedWrite,
};
use crate::render::backends::vulkan::swapchain::VulkanSwapchain;
use crate::render::backends::vulkan::texture::{VulkanSampler, VulkanTexture};
use crate::render::binding::{DescriptorUpdate, DescriptorWrite, UpdateFrequency};
use crate::render::resources::{
    BufferDesc, BufferHandle, DescriptorSetHandle, SamplerDesc, SamplerHandle, TextureDesc,
    TextureHandle,
};
use crate::render::state::ResourceState;
use crate::render::RenderError;
use crate::util::IndexPool;

/// Graphics-queue command recording state.
///
/// `active` is always in the recording state between submits. `setup`
/// is a second buffer for one-off initialization barriers so they
/// never mix with frame commands.
struct CommandStream {
    device: ash::Device,
    pool: vk::CommandPool,
    active: vk::CommandBuffer,
    setup: vk::CommandBuffer,
    fence: vk::Fence,
}

impl CommandStream {
    fn new(device: &ash::Device, family: u32) -> Result<Self, VulkanError> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(family);
        let pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(2);
        let buffers = unsafe {
            match device.allocate_command_buffers(&alloc_info) {
                Ok(buffers) => buffers,
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

        let stream = Self {
            device: device.clone(),
            pool,
            active: buffers[0],
            setup: buffers[1],
            fence,
        };
        stream.begin(stream.active)?;
        Ok(stream)
    }

    fn begin(&self, command_buffer: vk::CommandBuffer) -> Result<(), VulkanError> {
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)
        }
    }

    /// End the active buffer, submit it, block on the fence, start a
    /// fresh recording
    fn flush(
        &self,
        queue: vk::Queue,
        wait: Option<(vk::Semaphore, vk::PipelineStageFlags)>,
        signal: Option<vk::Semaphore>,
    ) -> Result<(), VulkanError> {
        unsafe {
            self.device
                .end_command_buffer(self.active)
                .map_err(VulkanError::Api)?;

            let command_buffers = [self.active];
            let mut submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
            let wait_semaphores;
            let wait_stages;
            if let Some((semaphore, stage)) = wait {
                wait_semaphores = [semaphore];
                wait_stages = [stage];
                submit_info = submit_info
                    .wait_semaphores(&wait_semaphores)
                    .wait_dst_stage_mask(&wait_stages);
            }
            let signal_semaphores;
            if let Some(semaphore) = signal {
                signal_semaphores = [semaphore];
                submit_info = submit_info.signal_semaphores(&signal_semaphores);
            }

            self.device
                .queue_submit(queue, &[submit_info.build()], self.fence)
                .map_err(VulkanError::Api)?;
            self.device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(VulkanError::Api)?;
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)?;
            self.device
                .reset_command_buffer(self.active, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
        }
        self.begin(self.active)
    }

    /// Record and submit a one-off batch on the setup buffer, waiting
    /// for the queue to idle
    fn submit_setup<F>(&self, queue: vk::Queue, record: F) -> Result<(), VulkanError>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        unsafe {
            self.device
                .reset_command_buffer(self.setup, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
        }
        self.begin(self.setup)?;
        record(&self.device, self.setup);
        unsafe {
            self.device
                .end_command_buffer(self.setup)
                .map_err(VulkanError::Api)?;
            let command_buffers = [self.setup];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
            self.device
                .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device
                .queue_wait_idle(queue)
                .map_err(VulkanError::Api)?;
        }
        Ok(())
    }
}

impl Drop for CommandStream {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// A live set together with the partition it was allocated for
struct DescriptorSetEntry {
    set: vk::DescriptorSet,
    frequency: UpdateFrequency,
}

/// Vulkan renderer.
///
/// Field order keeps the context alive until every resource that
/// borrows its device has dropped.
pub struct VulkanRenderer {
    buffers: SlotMap<BufferHandle, VulkanBuffer>,
    textures: SlotMap<TextureHandle, VulkanTexture>,
    samplers: SlotMap<SamplerHandle, VulkanSampler>,
    descriptor_sets: SlotMap<DescriptorSetHandle, DescriptorSetEntry>,
    ui_slots: IndexPool,
    copy_engine: CopyEngine,
    descriptors: DescriptorAllocator,
    commands: CommandStream,
    swapchain: Option<VulkanSwapchain>,
    context: VulkanContext,
}

impl VulkanRenderer {
    /// Build the full backend: context, optional swapchain, descriptor
    /// pool, copy engine and command stream
    pub fn new(
        config: &RendererConfig,
        surface: Option<&dyn SurfaceProvider>,
    ) -> BackendResult<Self> {
        let context = VulkanContext::new(config, surface)?;

        let swapchain = match surface {
            Some(window) => Some(VulkanSwapchain::new(
                context.entry(),
                context.instance(),
                context.physical_device(),
                context.device(),
                context.graphics().family,
                window,
            )?),
            None => None,
        };

        let descriptors = DescriptorAllocator::new(context.device(), config)?;
        let copy_engine = CopyEngine::new(context.device(), context.transfer())?;
        let commands = CommandStream::new(context.device(), context.graphics().family)?;

        log::info!(
            "Vulkan renderer ready ({})",
            if swapchain.is_some() {
                "windowed"
            } else {
                "headless"
            }
        );

        Ok(Self {
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            descriptor_sets: SlotMap::with_key(),
            ui_slots: IndexPool::new(config.descriptors.shader_visible),
            copy_engine,
            descriptors,
            commands,
            swapchain,
            context,
        })
    }

    fn barrier_target(&self, resource: ResourceRef) -> BackendResult<BarrierTarget> {
        match resource {
            ResourceRef::Buffer(handle) => {
                let buffer = self.buffers.get(handle).ok_or(RenderError::UnknownHandle)?;
                Ok(BarrierTarget::Buffer {
                    buffer: buffer.handle(),
                    size: buffer.size(),
                })
            }
            ResourceRef::Texture(handle) => {
                let texture = self.textures.get(handle).ok_or(RenderError::UnknownHandle)?;
                Ok(BarrierTarget::Image {
                    image: texture.image(),
                    aspect: texture.aspect(),
                    mip_levels: texture.mip_levels(),
                    array_layers: texture.array_layers(),
                })
            }
        }
    }

    /// Record one transition batch through the setup command buffer
    /// on the graphics queue, blocking until the queue idles
    fn setup_transition(
        &self,
        target: BarrierTarget,
        before: ResourceState,
        after: ResourceState,
    ) -> BackendResult<()> {
        let batch = plan_barriers(&[(target, before, after)], QueueKind::Graphics);
        self.commands
            .submit_setup(self.context.graphics().queue, |device, cmd| {
                record_barriers(device, cmd, &batch);
            })?;
        Ok(())
    }

    fn resolve_write(&self, write: &DescriptorWrite) -> BackendResult<ResolvedWrite> {
        let update = match write.update {
            DescriptorUpdate::UniformBuffer {
                buffer,
                offset,
                range,
            } => {
                let buffer = self.buffers.get(buffer).ok_or(RenderError::UnknownHandle)?;
                ResolvedUpdate::UniformBuffer(vk::DescriptorBufferInfo {
                    buffer: buffer.handle(),
                    offset,
                    range,
                })
            }
            DescriptorUpdate::StorageBuffer {
                buffer,
                offset,
                range,
            } => {
                let buffer = self.buffers.get(buffer).ok_or(RenderError::UnknownHandle)?;
                ResolvedUpdate::StorageBuffer(vk::DescriptorBufferInfo {
                    buffer: buffer.handle(),
                    offset,
                    range,
                })
            }
            DescriptorUpdate::SampledTexture { texture } => {
                let texture = self.textures.get(texture).ok_or(RenderError::UnknownHandle)?;
                ResolvedUpdate::SampledTexture(texture.view())
            }
            DescriptorUpdate::StorageTexture { texture } => {
                let texture = self.textures.get(texture).ok_or(RenderError::UnknownHandle)?;
                ResolvedUpdate::StorageTexture(texture.view())
            }
            DescriptorUpdate::Sampler { sampler } => {
                let sampler = self.samplers.get(sampler).ok_or(RenderError::UnknownHandle)?;
                ResolvedUpdate::Sampler(sampler.handle())
            }
        };
        Ok(ResolvedWrite {
            binding: write.binding,
            array_element: write.array_element,
            update,
        })
    }
}

fn check_state(state: ResourceState) -> BackendResult<()> {
    if state.is_valid() {
        Ok(())
    } else {
        Err(RenderError::InvalidState(state))
    }
}

/// Transition that moves a freshly filled resource from the
/// copy-destination state to its declared resting state. `None` when
/// the resource already rests as a copy destination.
fn upload_rest_transition(rest: ResourceState) -> Option<(ResourceState, ResourceState)> {
    if rest == ResourceState::COPY_DEST {
        None
    } else {
        Some((ResourceState::COPY_DEST, rest))
    }
}

impl RenderBackend for VulkanRenderer {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::Vulkan
    }

    fn swapchain_extent(&self) -> Option<(u32, u32)> {
        self.swapchain
            .as_ref()
            .map(|swapchain| (swapchain.extent().width, swapchain.extent().height))
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> BackendResult<BufferHandle> {
        check_state(desc.initial_state)?;
        let buffer = VulkanBuffer::from_desc(
            self.context.device(),
            self.context.memory_properties(),
            desc,
        )?;
        Ok(self.buffers.insert(buffer))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> BackendResult<()> {
        self.buffers
            .remove(buffer)
            .map(drop)
            .ok_or(RenderError::UnknownHandle)
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<TextureHandle> {
        check_state(desc.initial_state)?;
        let texture = VulkanTexture::new(
            self.context.device(),
            self.context.memory_properties(),
            desc,
        )?;
        Ok(self.textures.insert(texture))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()> {
        self.textures
            .remove(texture)
            .map(drop)
            .ok_or(RenderError::UnknownHandle)
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> BackendResult<SamplerHandle> {
        let sampler = VulkanSampler::new(self.context.device(), desc)?;
        Ok(self.samplers.insert(sampler))
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) -> BackendResult<()> {
        self.samplers
            .remove(sampler)
            .map(drop)
            .ok_or(RenderError::UnknownHandle)
    }

    fn create_descriptor_set(
        &mut self,
        frequency: UpdateFrequency,
    ) -> BackendResult<DescriptorSetHandle> {
        let set = self.descriptors.create_set(frequency)?;
        Ok(self
            .descriptor_sets
            .insert(DescriptorSetEntry { set, frequency }))
    }

    fn update_descriptor_set(
        &mut self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    ) -> BackendResult<()> {
        let entry = self
            .descriptor_sets
            .get(set)
            .ok_or(RenderError::UnknownHandle)?;
        let native = entry.set;
        let frequency = entry.frequency;
        for write in writes {
            if !frequency.accepts(&write.update) {
                return Err(VulkanError::InvalidOperation {
                    reason: format!(
                        "write at binding {} does not belong in the {:?} partition",
                        write.binding, frequency
                    ),
                }
                .into());
            }
        }
        let resolved = writes
            .iter()
            .map(|write| self.resolve_write(write))
            .collect::<BackendResult<Vec<_>>>()?;
        self.descriptors.write_set(native, &resolved);
        Ok(())
    }

    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle) -> BackendResult<()> {
        let entry = self
            .descriptor_sets
            .remove(set)
            .ok_or(RenderError::UnknownHandle)?;
        self.descriptors.free_set(entry.set)?;
        Ok(())
    }

    fn reserve_ui_descriptor_slot(&mut self) -> BackendResult<u32> {
        Ok(self.ui_slots.allocate()?)
    }

    fn resource_barrier(&mut self, transitions: &[ResourceTransition]) -> BackendResult<()> {
        let mut planned = Vec::with_capacity(transitions.len());
        for transition in transitions {
            check_state(transition.before)?;
            check_state(transition.after)?;
            planned.push((
                self.barrier_target(transition.resource)?,
                transition.before,
                transition.after,
            ));
        }
        let batch = plan_barriers(&planned, QueueKind::Graphics);
        record_barriers(self.context.device(), self.commands.active, &batch);
        Ok(())
    }

    fn initial_transition(
        &mut self,
        resource: ResourceRef,
        state: ResourceState,
    ) -> BackendResult<()> {
        check_state(state)?;
        let target = self.barrier_target(resource)?;
        self.setup_transition(target, ResourceState::COMMON, state)
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, bytes: &[u8]) -> BackendResult<()> {
        let dst = self.buffers.get(buffer).ok_or(RenderError::UnknownHandle)?;
        let rest = dst.initial_state;
        self.copy_engine
            .upload_buffer(self.context.memory_properties(), dst, bytes)?;
        if !bytes.is_empty() {
            if let Some((before, after)) = upload_rest_transition(rest) {
                let target = self.barrier_target(ResourceRef::Buffer(buffer))?;
                self.setup_transition(target, before, after)?;
            }
        }
        Ok(())
    }

    fn upload_texture(
        &mut self,
        texture: TextureHandle,
        description: &TextureDescription,
        bytes: &[u8],
    ) -> BackendResult<()> {
        let dst = self.textures.get(texture).ok_or(RenderError::UnknownHandle)?;
        let rest = dst.initial_state;
        self.copy_engine
            .upload_texture(self.context.memory_properties(), dst, description, bytes)?;
        if description.data_len() > 0 {
            if let Some((before, after)) = upload_rest_transition(rest) {
                let target = self.barrier_target(ResourceRef::Texture(texture))?;
                self.setup_transition(target, before, after)?;
            }
        }
        Ok(())
    }

    fn submit(&mut self) -> BackendResult<()> {
        self.commands
            .flush(self.context.graphics().queue, None, None)?;
        Ok(())
    }

    fn present(&mut self) -> BackendResult<()> {
        let swapchain = self.swapchain.as_ref().ok_or(RenderError::NoSurface)?;
        let index = swapchain.acquire_next_image()?;

        // The acquired image's contents are undefined on first use;
        // move it straight to the presentable layout
        let target = BarrierTarget::Image {
            image: swapchain.image(index),
            aspect: vk::ImageAspectFlags::COLOR,
            mip_levels: 1,
            array_layers: 1,
        };
        let batch = plan_barriers(
            &[(target, ResourceState::COMMON, ResourceState::PRESENT)],
            QueueKind::Graphics,
        );
        record_barriers(self.context.device(), self.commands.active, &batch);

        self.commands.flush(
            self.context.graphics().queue,
            Some((
                swapchain.image_available(),
                vk::PipelineStageFlags::TOP_OF_PIPE,
            )),
            Some(swapchain.render_finished()),
        )?;
        swapchain.present(self.context.graphics().queue, index)?;
        Ok(())
    }

    fn wait_idle(&self) -> BackendResult<()> {
        self.context.wait_idle()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploaded_resources_move_to_their_resting_state() {
        assert_eq!(
            upload_rest_transition(ResourceState::SHADER_RESOURCE),
            Some((ResourceState::COPY_DEST, ResourceState::SHADER_RESOURCE))
        );
        assert_eq!(
            upload_rest_transition(ResourceState::VERTEX_AND_CONSTANT_BUFFER),
            Some((
                ResourceState::COPY_DEST,
                ResourceState::VERTEX_AND_CONSTANT_BUFFER
            ))
        );
    }

    #[test]
    fn test_copy_dest_resting_state_needs_no_transition() {
        assert_eq!(upload_rest_transition(ResourceState::COPY_DEST), None);
    }
}
