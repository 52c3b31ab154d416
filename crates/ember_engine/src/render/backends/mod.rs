//! Native backend implementations

pub mod vulkan;

#[cfg(windows)]
pub mod dx12;
