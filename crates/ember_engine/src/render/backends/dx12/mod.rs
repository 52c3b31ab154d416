//! DirectX 12 backend (Windows only)
//!
//! Mirrors the Vulkan backend's shape: a device module owning
//! initialization and queues, descriptor heaps with free-list index
//! pools, a pure state-translation module for barriers, committed
//! resources, the synchronous copy engine and the renderer facade.

pub mod barrier;
pub mod copy;
pub mod device;
pub mod heaps;
pub mod renderer;
pub mod resources;
pub mod swapchain;

pub use device::{Dx12Device, Dx12Error, Dx12Result};
pub use renderer::Dx12Renderer;
