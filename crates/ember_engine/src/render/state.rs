//! Logical resource states shared by both backends
//!
//! Each backend translates these bits into its native model: D3D12
//! resource states on one side, Vulkan image layouts plus access and
//! pipeline-stage masks on the other. The engine never tracks a
//! resource's current state; callers pass the before/after pair into
//! every barrier call.

use bitflags::bitflags;

bitflags! {
    /// Bitmask of logical resource usage states.
    ///
    /// `GENERIC_READ`, `COMMON` and `PRESENT` are exclusive: they
    /// cannot be combined with any other bits. Everything else may be
    /// freely OR'd together.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        /// Readable as a vertex or constant buffer
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        /// Readable as an index buffer
        const INDEX_BUFFER = 0x2;
        /// Writable as a color render target
        const RENDER_TARGET = 0x4;
        /// Read/write through unordered-access views
        const UNORDERED_ACCESS = 0x8;
        /// Writable depth-stencil attachment
        const DEPTH_WRITE = 0x10;
        /// Read-only depth-stencil attachment
        const DEPTH_READ = 0x20;
        /// Sampled from non-pixel shader stages
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        /// Sampled from the pixel shader stage
        const PIXEL_SHADER_RESOURCE = 0x80;
        /// Stream-output target
        const STREAM_OUT = 0x100;
        /// Source of indirect draw/dispatch arguments
        const INDIRECT_ARGUMENT = 0x200;
        /// Destination of a copy operation
        const COPY_DEST = 0x400;
        /// Source of a copy operation
        const COPY_SOURCE = 0x800;
        /// Ready for swapchain presentation (exclusive)
        const PRESENT = 0x1000;
        /// Undifferentiated common state (exclusive)
        const COMMON = 0x2000;
        /// Combined read-everything state (exclusive)
        const GENERIC_READ = Self::VERTEX_AND_CONSTANT_BUFFER.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::NON_PIXEL_SHADER_RESOURCE.bits()
            | Self::PIXEL_SHADER_RESOURCE.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_SOURCE.bits();
    }
}

impl ResourceState {
    /// Both shader-resource bits
    pub const SHADER_RESOURCE: Self = Self::NON_PIXEL_SHADER_RESOURCE.union(Self::PIXEL_SHADER_RESOURCE);

    /// Whether this combination of bits is a legal state.
    ///
    /// The exclusive states must stand alone; an empty mask is also
    /// rejected since a barrier from or to "nothing" is meaningless
    /// (use `COMMON` for the undefined/initial case).
    pub fn is_valid(self) -> bool {
        if self.is_empty() {
            return false;
        }
        for exclusive in [Self::GENERIC_READ, Self::COMMON, Self::PRESENT] {
            if self.contains(exclusive) && self != exclusive {
                return false;
            }
        }
        true
    }

    /// Whether any shader-read bit is set
    pub fn is_shader_resource(self) -> bool {
        self.intersects(Self::SHADER_RESOURCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_read_composition() {
        // GENERIC_READ is exactly the OR of its documented members
        let composed = ResourceState::VERTEX_AND_CONSTANT_BUFFER
            | ResourceState::INDEX_BUFFER
            | ResourceState::NON_PIXEL_SHADER_RESOURCE
            | ResourceState::PIXEL_SHADER_RESOURCE
            | ResourceState::INDIRECT_ARGUMENT
            | ResourceState::COPY_SOURCE;
        assert_eq!(composed, ResourceState::GENERIC_READ);
        assert!(ResourceState::GENERIC_READ.is_valid());
    }

    #[test]
    fn test_exclusive_states_reject_combination() {
        assert!(!(ResourceState::COMMON | ResourceState::COPY_DEST).is_valid());
        assert!(!(ResourceState::PRESENT | ResourceState::RENDER_TARGET).is_valid());
        assert!(!(ResourceState::GENERIC_READ | ResourceState::RENDER_TARGET).is_valid());
        assert!(ResourceState::COMMON.is_valid());
        assert!(ResourceState::PRESENT.is_valid());
    }

    #[test]
    fn test_ordinary_states_combine() {
        let state = ResourceState::COPY_SOURCE | ResourceState::PIXEL_SHADER_RESOURCE;
        assert!(state.is_valid());
        assert!(state.is_shader_resource());
        assert!(!ResourceState::empty().is_valid());
    }
}
