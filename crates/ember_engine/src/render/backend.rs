//! Backend abstraction for the rendering system
//!
//! The original design bound a process-wide function-pointer table to
//! one of the two native implementations at init time. Here the same
//! dispatch surface is a trait with two concrete implementations,
//! selected at construction and owned behind a single boxed handle.
//! Switching backends means dropping the box and building a new one;
//! there is no cross-backend resource migration.

use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use serde::{Deserialize, Serialize};

use crate::assets::TextureDescription;
use crate::config::RendererConfig;
use crate::render::binding::{DescriptorWrite, UpdateFrequency};
use crate::render::resources::{
    BufferDesc, BufferHandle, DescriptorSetHandle, SamplerDesc, SamplerHandle, TextureDesc,
    TextureHandle,
};
use crate::render::state::ResourceState;
use crate::render::RenderError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Which native graphics API backs the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GraphicsApi {
    /// Vulkan backend
    #[default]
    Vulkan,
    /// DirectX 12 backend (Windows only)
    DirectX12,
}

/// Kind of queue a command buffer is submitted on.
///
/// Pipeline-stage computation for Vulkan barriers depends on the
/// submitting queue's capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Graphics-capable queue
    Graphics,
    /// Compute-only queue
    Compute,
    /// Transfer-only queue
    Transfer,
}

/// A resource referenced by a barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    /// A buffer
    Buffer(BufferHandle),
    /// A texture
    Texture(TextureHandle),
}

/// One requested state transition.
///
/// The caller supplies both states; the engine performs no tracking.
/// A wrong `before` state is a programmer error caught only by the
/// native validation layer in debug builds.
#[derive(Debug, Clone, Copy)]
pub struct ResourceTransition {
    /// Resource to transition
    pub resource: ResourceRef,
    /// State the caller last left the resource in
    pub before: ResourceState,
    /// State the resource moves to
    pub after: ResourceState,
}

impl ResourceTransition {
    /// Convenience constructor
    pub fn new(resource: ResourceRef, before: ResourceState, after: ResourceState) -> Self {
        Self {
            resource,
            before,
            after,
        }
    }
}

/// Window abstraction the renderer builds its presentation surface
/// from. The engine never creates or manages windows itself.
pub trait SurfaceProvider: HasRawWindowHandle + HasRawDisplayHandle {}

impl<T: HasRawWindowHandle + HasRawDisplayHandle + ?Sized> SurfaceProvider for T {}

/// Main rendering backend trait.
///
/// One implementation per native API; all renderer state lives in the
/// implementing object, passed explicitly to every call.
pub trait RenderBackend {
    /// Which API this backend drives
    fn api(&self) -> GraphicsApi;

    /// Current swapchain extent, if a surface was provided
    fn swapchain_extent(&self) -> Option<(u32, u32)>;

    /// Create a buffer. The buffer is left in `desc.initial_state`.
    fn create_buffer(&mut self, desc: &BufferDesc) -> BackendResult<BufferHandle>;

    /// Destroy a buffer, releasing its native handles and returning
    /// any descriptor indices it held to their free lists
    fn destroy_buffer(&mut self, buffer: BufferHandle) -> BackendResult<()>;

    /// Create a texture. The texture is left in `desc.initial_state`
    /// once uploaded.
    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<TextureHandle>;

    /// Destroy a texture, releasing native handles and descriptors
    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()>;

    /// Create a sampler
    fn create_sampler(&mut self, desc: &SamplerDesc) -> BackendResult<SamplerHandle>;

    /// Destroy a sampler
    fn destroy_sampler(&mut self, sampler: SamplerHandle) -> BackendResult<()>;

    /// Create a descriptor set for one update-frequency partition
    fn create_descriptor_set(
        &mut self,
        frequency: UpdateFrequency,
    ) -> BackendResult<DescriptorSetHandle>;

    /// Write resource bindings into a descriptor set
    fn update_descriptor_set(
        &mut self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    ) -> BackendResult<()>;

    /// Destroy a descriptor set, returning its slots to the pool
    fn destroy_descriptor_set(&mut self, set: DescriptorSetHandle) -> BackendResult<()>;

    /// Reserve one shader-visible descriptor slot for external use
    /// (the UI layer's font atlas). The slot stays live until the
    /// renderer is destroyed.
    fn reserve_ui_descriptor_slot(&mut self) -> BackendResult<u32>;

    /// Record a batch of state transitions into the renderer's active
    /// command buffer. `before == after == UNORDERED_ACCESS` emits a
    /// read-after-write hazard barrier instead of a full transition.
    fn resource_barrier(&mut self, transitions: &[ResourceTransition]) -> BackendResult<()>;

    /// Record and submit exactly one setup barrier on the primary
    /// queue, blocking until the queue idles. For one-off transitions
    /// after resource creation, never the per-frame hot path.
    fn initial_transition(&mut self, resource: ResourceRef, state: ResourceState)
        -> BackendResult<()>;

    /// Synchronously upload bytes into a GPU-resident buffer via the
    /// copy engine. Blocks until the transfer queue idles.
    fn upload_buffer(&mut self, buffer: BufferHandle, bytes: &[u8]) -> BackendResult<()>;

    /// Synchronously upload decoded texture data via the copy engine,
    /// one copy per (slice, mip) image record. Blocks until the
    /// transfer queue idles.
    fn upload_texture(
        &mut self,
        texture: TextureHandle,
        description: &TextureDescription,
        bytes: &[u8],
    ) -> BackendResult<()>;

    /// Submit the active command buffer to the primary queue and wait
    /// for it, then begin recording a fresh one
    fn submit(&mut self) -> BackendResult<()>;

    /// Present the next swapchain image. Errors if the renderer was
    /// created without a surface.
    fn present(&mut self) -> BackendResult<()>;

    /// Block until the device is idle. Unbounded wait; a hung device
    /// hangs the calling thread.
    fn wait_idle(&self) -> BackendResult<()>;

    /// Downcast to the concrete backend type
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to the mutable concrete backend type
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Construct a renderer for the requested API.
///
/// `surface` is the window to present to; `None` builds a headless
/// renderer (uploads and barriers work, `present` errors).
pub fn create_renderer(
    api: GraphicsApi,
    config: &RendererConfig,
    surface: Option<&dyn SurfaceProvider>,
) -> BackendResult<Box<dyn RenderBackend>> {
    log::info!("creating renderer: {:?}", api);
    match api {
        GraphicsApi::Vulkan => {
            let renderer = crate::render::backends::vulkan::VulkanRenderer::new(config, surface)?;
            Ok(Box::new(renderer))
        }
        GraphicsApi::DirectX12 => {
            #[cfg(windows)]
            {
                let renderer = crate::render::backends::dx12::Dx12Renderer::new(config, surface)?;
                Ok(Box::new(renderer))
            }
            #[cfg(not(windows))]
            {
                Err(RenderError::UnsupportedBackend(api))
            }
        }
    }
}
