//! Vulkan backend
//!
//! Built directly on ash. The context owns instance and device;
//! everything else clones the device handle and cleans up in Drop.

pub mod barrier;
pub mod buffer;
pub mod context;
pub mod copy;
pub mod descriptors;
pub mod renderer;
pub mod swapchain;
pub mod texture;

pub use context::{VulkanContext, VulkanError, VulkanResult};
pub use renderer::VulkanRenderer;
