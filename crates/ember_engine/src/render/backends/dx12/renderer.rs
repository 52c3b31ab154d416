//! DirectX 12 implementation of the render backend trait
//!
//! Descriptor sets are emulated: each set owns shader-visible heap
//! slots keyed by (binding, array element), allocated on first write
//! and returned to the free lists when the set is destroyed. Views
//! are written straight into the shader-visible heaps.

use std::collections::HashMap;

use slotmap::SlotMap;
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D12::{
    ID3D12CommandAllocator, ID3D12GraphicsCommandList, D3D12_BUFFER_UAV,
    D3D12_BUFFER_UAV_FLAG_RAW, D3D12_COMMAND_LIST_TYPE_DIRECT,
    D3D12_CONSTANT_BUFFER_VIEW_DESC, D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
    D3D12_DESCRIPTOR_HEAP_TYPE_DSV, D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
    D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER, D3D12_RESOURCE_BARRIER,
    D3D12_UAV_DIMENSION_BUFFER, D3D12_UNORDERED_ACCESS_VIEW_DESC,
    D3D12_UNORDERED_ACCESS_VIEW_DESC_0,
};
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT_R32_TYPELESS;

use crate::assets::TextureDescription;
use crate::config::RendererConfig;
use crate::render::backend::{
    BackendResult, GraphicsApi, RenderBackend, ResourceRef, ResourceTransition, SurfaceProvider,
};
use crate::render::backends::dx12::barrier::{plan_barrier, record_barriers};
use crate::render::backends::dx12::copy::CopyEngine;
use crate::render::backends::dx12::device::{Dx12Device, Dx12Error, Queue};
use crate::render::backends::dx12::heaps::DescriptorHeap;
use crate::render::backends::dx12::resources::{Dx12Buffer, Dx12Sampler, Dx12Texture};
use crate::render::backends::dx12::swapchain::Dx12Swapchain;
use crate::render::binding::{DescriptorUpdate, DescriptorWrite, UpdateFrequency};
use crate::render::resources::{
    BufferDesc, BufferHandle, DescriptorSetHandle, MemoryUsage, SamplerDesc, SamplerHandle,
    TextureDesc, TextureHandle, TextureUsage,
};
use crate::render::state::ResourceState;
use crate::render::RenderError;

const CBV_ALIGNMENT: u64 = 256;

/// Attachment view slots a texture owns in the CPU heaps
#[derive(Default)]
struct TextureViews {
    rtv: Option<u32>,
    dsv: Option<u32>,
}

/// Emulated descriptor set: owned heap slots keyed by binding slot
struct Dx12DescriptorSet {
    frequency: UpdateFrequency,
    resource_slots: HashMap<(u32, u32), u32>,
    sampler_slots: HashMap<(u32, u32), u32>,
}

/// Direct command recording state
struct CommandStream {
    queue: Queue,
    allocator: ID3D12CommandAllocator,
    list: ID3D12GraphicsCommandList,
    setup_allocator: ID3D12CommandAllocator,
    setup_list: ID3D12GraphicsCommandList,
}

impl CommandStream {
    fn new(device: &Dx12Device) -> Result<Self, Dx12Error> {
        let queue = Queue::new(device.device(), D3D12_COMMAND_LIST_TYPE_DIRECT)?;
        let allocator: ID3D12CommandAllocator = unsafe {
            device
                .device()
                .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)?
        };
        let list: ID3D12GraphicsCommandList = unsafe {
            device
                .device()
                .CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &allocator, None)?
        };
        let setup_allocator: ID3D12CommandAllocator = unsafe {
            device
                .device()
                .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)?
        };
        let setup_list: ID3D12GraphicsCommandList = unsafe {
            device.device().CreateCommandList(
                0,
                D3D12_COMMAND_LIST_TYPE_DIRECT,
                &setup_allocator,
                None,
            )?
        };
        unsafe { setup_list.Close()? };

        // The main list stays open for recording between submits
        Ok(Self {
            queue,
            allocator,
            list,
            setup_allocator,
            setup_list,
        })
    }

    fn flush(&mut self) -> Result<(), Dx12Error> {
        unsafe { self.list.Close()? };
        let submission = self.queue.submit(&self.list.cast()?)?;
        self.queue.wait(submission)?;
        unsafe {
            self.allocator.Reset()?;
            self.list.Reset(&self.allocator, None)?;
        }
        Ok(())
    }

    fn submit_setup(&mut self, barriers: &[D3D12_RESOURCE_BARRIER]) -> Result<(), Dx12Error> {
        unsafe {
            self.setup_allocator.Reset()?;
            self.setup_list.Reset(&self.setup_allocator, None)?;
        }
        record_barriers(&self.setup_list, barriers);
        unsafe { self.setup_list.Close()? };
        let submission = self.queue.submit(&self.setup_list.cast()?)?;
        self.queue.wait(submission)
    }
}

/// DirectX 12 renderer
pub struct Dx12Renderer {
    buffers: SlotMap<BufferHandle, Dx12Buffer>,
    textures: SlotMap<TextureHandle, Dx12Texture>,
    samplers: SlotMap<SamplerHandle, Dx12Sampler>,
    descriptor_sets: SlotMap<DescriptorSetHandle, Dx12DescriptorSet>,
    texture_views: HashMap<TextureHandle, TextureViews>,
    rtv_heap: DescriptorHeap,
    dsv_heap: DescriptorHeap,
    staging_heap: DescriptorHeap,
    shader_visible: DescriptorHeap,
    shader_visible_samplers: DescriptorHeap,
    commands: CommandStream,
    copy_engine: CopyEngine,
    swapchain: Option<Dx12Swapchain>,
    device: Dx12Device,
}

impl Dx12Renderer {
    /// Build the full backend: device, heaps, queues and the optional
    /// swapchain
    pub fn new(
        config: &RendererConfig,
        surface: Option<&dyn SurfaceProvider>,
    ) -> BackendResult<Self> {
        let device = Dx12Device::new(config)?;
        let capacities = &config.descriptors;

        let rtv_heap = DescriptorHeap::new(
            device.device(),
            D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
            capacities.render_target,
            false,
        )?;
        let dsv_heap = DescriptorHeap::new(
            device.device(),
            D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
            capacities.depth_stencil,
            false,
        )?;
        let staging_heap = DescriptorHeap::new(
            device.device(),
            D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
            capacities.shader_resource,
            false,
        )?;
        let shader_visible = DescriptorHeap::new(
            device.device(),
            D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
            capacities.shader_visible,
            true,
        )?;
        let shader_visible_samplers = DescriptorHeap::new(
            device.device(),
            D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER,
            capacities.shader_visible_sampler,
            true,
        )?;

        let commands = CommandStream::new(&device)?;
        let copy_engine = CopyEngine::new(device.device())?;

        let swapchain = match surface {
            Some(window) => Some(Dx12Swapchain::new(
                device.factory(),
                commands.queue.handle(),
                window,
            )?),
            None => None,
        };

        log::info!(
            "D3D12 renderer ready ({})",
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
            texture_views: HashMap::new(),
            rtv_heap,
            dsv_heap,
            staging_heap,
            shader_visible,
            shader_visible_samplers,
            commands,
            copy_engine,
            swapchain,
            device,
        })
    }

    fn barrier(&self, transition: &ResourceTransition) -> BackendResult<D3D12_RESOURCE_BARRIER> {
        check_state(transition.before)?;
        check_state(transition.after)?;
        let resource = match transition.resource {
            ResourceRef::Buffer(handle) => self
                .buffers
                .get(handle)
                .ok_or(RenderError::UnknownHandle)?
                .resource(),
            ResourceRef::Texture(handle) => self
                .textures
                .get(handle)
                .ok_or(RenderError::UnknownHandle)?
                .resource(),
        };
        Ok(plan_barrier(resource, transition.before, transition.after))
    }

    fn write_descriptor(
        &mut self,
        set: DescriptorSetHandle,
        write: &DescriptorWrite,
    ) -> BackendResult<()> {
        let key = (write.binding, write.array_element);
        let is_sampler = matches!(write.update, DescriptorUpdate::Sampler { .. });

        // Allocate the slot before borrowing resources so exhaustion
        // reports cleanly
        let slot = {
            let entry = self
                .descriptor_sets
                .get_mut(set)
                .ok_or(RenderError::UnknownHandle)?;
            if !entry.frequency.accepts(&write.update) {
                return Err(Dx12Error::InvalidOperation {
                    reason: format!(
                        "write at binding {} does not belong in the {:?} partition",
                        write.binding, entry.frequency
                    ),
                }
                .into());
            }
            let (slots, heap) = if is_sampler {
                (&mut entry.sampler_slots, &mut self.shader_visible_samplers)
            } else {
                (&mut entry.resource_slots, &mut self.shader_visible)
            };
            match slots.get(&key) {
                Some(slot) => *slot,
                None => {
                    let slot = heap.allocate()?;
                    slots.insert(key, slot);
                    slot
                }
            }
        };

        // Samplers write straight into their shader-visible heap;
        // resource views stage through the CPU heap and copy over
        if let DescriptorUpdate::Sampler { sampler } = write.update {
            let sampler = self.samplers.get(sampler).ok_or(RenderError::UnknownHandle)?;
            unsafe {
                self.device.device().CreateSampler(
                    sampler.desc(),
                    self.shader_visible_samplers.cpu_handle(slot),
                );
            }
            return Ok(());
        }

        let stage = self.staging_heap.allocate()?;
        let stage_handle = self.staging_heap.cpu_handle(stage);
        let result = (|| -> BackendResult<()> {
            match write.update {
                DescriptorUpdate::UniformBuffer {
                    buffer,
                    offset,
                    range,
                } => {
                    let buffer = self.buffers.get(buffer).ok_or(RenderError::UnknownHandle)?;
                    let size = (range + CBV_ALIGNMENT - 1) / CBV_ALIGNMENT * CBV_ALIGNMENT;
                    let desc = D3D12_CONSTANT_BUFFER_VIEW_DESC {
                        BufferLocation: unsafe { buffer.resource().GetGPUVirtualAddress() }
                            + offset,
                        SizeInBytes: size as u32,
                    };
                    unsafe {
                        self.device
                            .device()
                            .CreateConstantBufferView(Some(&desc), stage_handle);
                    }
                }
                DescriptorUpdate::StorageBuffer {
                    buffer,
                    offset,
                    range,
                } => {
                    let buffer = self.buffers.get(buffer).ok_or(RenderError::UnknownHandle)?;
                    let desc = D3D12_UNORDERED_ACCESS_VIEW_DESC {
                        Format: DXGI_FORMAT_R32_TYPELESS,
                        ViewDimension: D3D12_UAV_DIMENSION_BUFFER,
                        Anonymous: D3D12_UNORDERED_ACCESS_VIEW_DESC_0 {
                            Buffer: D3D12_BUFFER_UAV {
                                FirstElement: offset / 4,
                                NumElements: (range / 4) as u32,
                                StructureByteStride: 0,
                                CounterOffsetInBytes: 0,
                                Flags: D3D12_BUFFER_UAV_FLAG_RAW,
                            },
                        },
                    };
                    unsafe {
                        self.device.device().CreateUnorderedAccessView(
                            buffer.resource(),
                            None,
                            Some(&desc),
                            stage_handle,
                        );
                    }
                }
                DescriptorUpdate::SampledTexture { texture } => {
                    let texture =
                        self.textures.get(texture).ok_or(RenderError::UnknownHandle)?;
                    unsafe {
                        self.device.device().CreateShaderResourceView(
                            texture.resource(),
                            None,
                            stage_handle,
                        );
                    }
                }
                DescriptorUpdate::StorageTexture { texture } => {
                    let texture =
                        self.textures.get(texture).ok_or(RenderError::UnknownHandle)?;
                    unsafe {
                        self.device.device().CreateUnorderedAccessView(
                            texture.resource(),
                            None,
                            None,
                            stage_handle,
                        );
                    }
                }
                DescriptorUpdate::Sampler { .. } => unreachable!(),
            }
            self.shader_visible
                .copy_from(self.device.device(), slot, stage_handle);
            Ok(())
        })();
        self.staging_heap.release(stage)?;
        result
    }
}

fn check_state(state: ResourceState) -> BackendResult<()> {
    if state.is_valid() {
        Ok(())
    } else {
        Err(RenderError::InvalidState(state))
    }
}

/// Transition that moves a freshly filled default-heap resource to
/// its declared resting state. Once the copy-queue fence signals the
/// resource has decayed to `COMMON`, so that is the before state.
/// Upload and readback heaps keep their fixed states and never
/// transition.
fn upload_rest_transition(
    memory: MemoryUsage,
    rest: ResourceState,
) -> Option<(ResourceState, ResourceState)> {
    if memory != MemoryUsage::GpuOnly || rest == ResourceState::COMMON {
        None
    } else {
        Some((ResourceState::COMMON, rest))
    }
}

impl RenderBackend for Dx12Renderer {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::DirectX12
    }

    fn swapchain_extent(&self) -> Option<(u32, u32)> {
        self.swapchain.as_ref().map(Dx12Swapchain::extent)
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> BackendResult<BufferHandle> {
        check_state(desc.initial_state)?;
        let buffer = Dx12Buffer::new(self.device.device(), desc)?;
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
        let texture = Dx12Texture::new(self.device.device(), desc)?;

        // Attachment views live in the CPU heaps for the texture's
        // whole lifetime
        let mut views = TextureViews::default();
        if desc.usage.contains(TextureUsage::RENDER_TARGET) {
            let slot = self.rtv_heap.allocate()?;
            unsafe {
                self.device.device().CreateRenderTargetView(
                    texture.resource(),
                    None,
                    self.rtv_heap.cpu_handle(slot),
                );
            }
            views.rtv = Some(slot);
        }
        if desc.usage.contains(TextureUsage::DEPTH_STENCIL) {
            let slot = self.dsv_heap.allocate()?;
            unsafe {
                self.device.device().CreateDepthStencilView(
                    texture.resource(),
                    None,
                    self.dsv_heap.cpu_handle(slot),
                );
            }
            views.dsv = Some(slot);
        }

        let handle = self.textures.insert(texture);
        self.texture_views.insert(handle, views);
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()> {
        self.textures
            .remove(texture)
            .ok_or(RenderError::UnknownHandle)?;
        if let Some(views) = self.texture_views.remove(&texture) {
            if let Some(slot) = views.rtv {
                self.rtv_heap.release(slot)?;
            }
            if let Some(slot) = views.dsv {
                self.dsv_heap.release(slot)?;
            }
        }
        Ok(())
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> BackendResult<SamplerHandle> {
        Ok(self.samplers.insert(Dx12Sampler::new(desc)))
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
        Ok(self.descriptor_sets.insert(Dx12DescriptorSet {
            frequency,
            resource_slots: HashMap::new(),
            sampler_slots: HashMap::new(),
        }))
    }

    fn update_descriptor_set(
        &mut self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    ) -> BackendResult<()> {
        for write in writes {
            self.write_descriptor(set, write)?;
        }
        Ok(())
    }

    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle) -> BackendResult<()> {
        let entry = self
            .descriptor_sets
            .remove(set)
            .ok_or(RenderError::UnknownHandle)?;
        for slot in entry.resource_slots.values() {
            self.shader_visible.release(*slot)?;
        }
        for slot in entry.sampler_slots.values() {
            self.shader_visible_samplers.release(*slot)?;
        }
        Ok(())
    }

    fn reserve_ui_descriptor_slot(&mut self) -> BackendResult<u32> {
        Ok(self.shader_visible.allocate()?)
    }

    fn resource_barrier(&mut self, transitions: &[ResourceTransition]) -> BackendResult<()> {
        let barriers = transitions
            .iter()
            .map(|transition| self.barrier(transition))
            .collect::<BackendResult<Vec<_>>>()?;
        record_barriers(&self.commands.list, &barriers);
        Ok(())
    }

    fn initial_transition(
        &mut self,
        resource: ResourceRef,
        state: ResourceState,
    ) -> BackendResult<()> {
        let barrier = self.barrier(&ResourceTransition::new(
            resource,
            ResourceState::COMMON,
            state,
        ))?;
        self.commands.submit_setup(&[barrier])?;
        Ok(())
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, bytes: &[u8]) -> BackendResult<()> {
        let dst = self.buffers.get(buffer).ok_or(RenderError::UnknownHandle)?;
        let memory = dst.memory();
        let rest = dst.initial_state;
        self.copy_engine
            .upload_buffer(self.device.device(), dst, bytes)?;
        if !bytes.is_empty() {
            if let Some((before, after)) = upload_rest_transition(memory, rest) {
                let barrier = self.barrier(&ResourceTransition::new(
                    ResourceRef::Buffer(buffer),
                    before,
                    after,
                ))?;
                self.commands.submit_setup(&[barrier])?;
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
            .upload_texture(self.device.device(), dst, description, bytes)?;
        if description.data_len() > 0 {
            if let Some((before, after)) = upload_rest_transition(MemoryUsage::GpuOnly, rest) {
                let barrier = self.barrier(&ResourceTransition::new(
                    ResourceRef::Texture(texture),
                    before,
                    after,
                ))?;
                self.commands.submit_setup(&[barrier])?;
            }
        }
        Ok(())
    }

    fn submit(&mut self) -> BackendResult<()> {
        self.commands.flush()?;
        Ok(())
    }

    fn present(&mut self) -> BackendResult<()> {
        let swapchain = self.swapchain.as_ref().ok_or(RenderError::NoSurface)?;
        self.commands.flush()?;
        swapchain.present()?;
        self.commands.queue.wait_idle()?;
        Ok(())
    }

    fn wait_idle(&self) -> BackendResult<()> {
        self.commands.queue.wait_idle()?;
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
    fn test_uploaded_default_heap_resources_leave_the_common_state() {
        assert_eq!(
            upload_rest_transition(MemoryUsage::GpuOnly, ResourceState::SHADER_RESOURCE),
            Some((ResourceState::COMMON, ResourceState::SHADER_RESOURCE))
        );
        // A COMMON resting state is where copy-queue decay already
        // leaves the resource
        assert_eq!(
            upload_rest_transition(MemoryUsage::GpuOnly, ResourceState::COMMON),
            None
        );
    }

    #[test]
    fn test_fixed_state_heaps_never_transition() {
        assert_eq!(
            upload_rest_transition(MemoryUsage::CpuToGpu, ResourceState::GENERIC_READ),
            None
        );
        assert_eq!(
            upload_rest_transition(MemoryUsage::GpuToCpu, ResourceState::COPY_DEST),
            None
        );
    }
}
