//! Resource state translation and batched pipeline barriers
//!
//! Logical [`ResourceState`] bits become image layouts, access masks
//! and pipeline-stage masks here. Stage masks depend on the
//! submitting queue's capabilities: a graphics queue derives shader
//! stages from the usage bits, a compute queue only has the compute
//! stage, and a transfer queue collapses to ALL_COMMANDS.
//!
//! One batch becomes exactly one `cmd_pipeline_barrier` call with
//! OR-accumulated before/after stage masks, not one call per
//! resource.

use ash::{vk, Device};

use crate::render::backend::QueueKind;
use crate::render::state::ResourceState;

/// Image layout a logical state maps to when used as a target state
pub fn image_layout(state: ResourceState) -> vk::ImageLayout {
    if state.contains(ResourceState::COPY_SOURCE) {
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL
    } else if state.contains(ResourceState::COPY_DEST) {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL
    } else if state.contains(ResourceState::RENDER_TARGET) {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    } else if state.contains(ResourceState::DEPTH_WRITE) {
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
    } else if state.contains(ResourceState::DEPTH_READ) {
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
    } else if state.contains(ResourceState::UNORDERED_ACCESS) {
        vk::ImageLayout::GENERAL
    } else if state.is_shader_resource() {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    } else if state.contains(ResourceState::PRESENT) {
        vk::ImageLayout::PRESENT_SRC_KHR
    } else if state == ResourceState::COMMON {
        vk::ImageLayout::GENERAL
    } else {
        vk::ImageLayout::UNDEFINED
    }
}

/// Access mask accumulated from every set state bit
pub fn access_mask(state: ResourceState) -> vk::AccessFlags {
    let mut access = vk::AccessFlags::empty();
    if state.contains(ResourceState::VERTEX_AND_CONSTANT_BUFFER) {
        access |= vk::AccessFlags::UNIFORM_READ | vk::AccessFlags::VERTEX_ATTRIBUTE_READ;
    }
    if state.contains(ResourceState::INDEX_BUFFER) {
        access |= vk::AccessFlags::INDEX_READ;
    }
    if state.contains(ResourceState::RENDER_TARGET) {
        access |= vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if state.contains(ResourceState::UNORDERED_ACCESS) {
        access |= vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE;
    }
    if state.contains(ResourceState::DEPTH_WRITE) {
        access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    if state.contains(ResourceState::DEPTH_READ) {
        access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if state.is_shader_resource() {
        access |= vk::AccessFlags::SHADER_READ;
    }
    if state.contains(ResourceState::INDIRECT_ARGUMENT) {
        access |= vk::AccessFlags::INDIRECT_COMMAND_READ;
    }
    if state.contains(ResourceState::COPY_DEST) {
        access |= vk::AccessFlags::TRANSFER_WRITE;
    }
    if state.contains(ResourceState::COPY_SOURCE) {
        access |= vk::AccessFlags::TRANSFER_READ;
    }
    // COMMON and PRESENT carry no access; they synchronize through
    // the stage masks and queue waits alone
    access
}

/// Pipeline stages that can produce or consume the given accesses on
/// the given queue kind
pub fn pipeline_stages(access: vk::AccessFlags, queue: QueueKind) -> vk::PipelineStageFlags {
    if queue == QueueKind::Transfer {
        // Transfer queues have no shader stages to speak of
        return vk::PipelineStageFlags::ALL_COMMANDS;
    }

    let mut stages = vk::PipelineStageFlags::empty();
    let shader_access =
        vk::AccessFlags::UNIFORM_READ | vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE;

    match queue {
        QueueKind::Graphics => {
            if access
                .intersects(vk::AccessFlags::INDEX_READ | vk::AccessFlags::VERTEX_ATTRIBUTE_READ)
            {
                stages |= vk::PipelineStageFlags::VERTEX_INPUT;
            }
            if access.intersects(shader_access) {
                stages |= vk::PipelineStageFlags::VERTEX_SHADER
                    | vk::PipelineStageFlags::FRAGMENT_SHADER
                    | vk::PipelineStageFlags::COMPUTE_SHADER;
            }
            if access.intersects(
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ) {
                stages |= vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
            }
            if access.intersects(
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ) {
                stages |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
            }
        }
        QueueKind::Compute => {
            if access.intersects(shader_access) {
                stages |= vk::PipelineStageFlags::COMPUTE_SHADER;
            }
        }
        QueueKind::Transfer => unreachable!(),
    }

    if access.intersects(vk::AccessFlags::INDIRECT_COMMAND_READ) {
        stages |= vk::PipelineStageFlags::DRAW_INDIRECT;
    }
    if access.intersects(vk::AccessFlags::TRANSFER_READ | vk::AccessFlags::TRANSFER_WRITE) {
        stages |= vk::PipelineStageFlags::TRANSFER;
    }
    stages
}

/// A barrier target with the native handles the command needs
#[derive(Clone, Copy)]
pub enum BarrierTarget {
    /// An image with its full subresource range
    Image {
        /// Image handle
        image: vk::Image,
        /// Aspect of the default view
        aspect: vk::ImageAspectFlags,
        /// Total mip levels
        mip_levels: u32,
        /// Total array layers
        array_layers: u32,
    },
    /// A buffer's whole byte range
    Buffer {
        /// Buffer handle
        buffer: vk::Buffer,
        /// Size in bytes
        size: vk::DeviceSize,
    },
}

/// One planned `cmd_pipeline_barrier` call
pub struct BarrierBatch {
    /// OR of every per-transition source stage mask
    pub src_stages: vk::PipelineStageFlags,
    /// OR of every per-transition destination stage mask
    pub dst_stages: vk::PipelineStageFlags,
    /// Image barriers in the batch
    pub image_barriers: Vec<vk::ImageMemoryBarrier>,
    /// Buffer barriers in the batch
    pub buffer_barriers: Vec<vk::BufferMemoryBarrier>,
}

/// Translate a batch of transitions into one pipeline-barrier call.
///
/// `before == after == UNORDERED_ACCESS` becomes a read-after-write
/// hazard barrier: access `SHADER_WRITE -> SHADER_WRITE|SHADER_READ`
/// with the layout held at `GENERAL`. Everything else is a full
/// transition. A `COMMON` before-state on an image maps to the
/// `UNDEFINED` layout, discarding contents, which is the intended
/// first-use behavior.
pub fn plan_barriers(
    transitions: &[(BarrierTarget, ResourceState, ResourceState)],
    queue: QueueKind,
) -> BarrierBatch {
    let mut batch = BarrierBatch {
        src_stages: vk::PipelineStageFlags::empty(),
        dst_stages: vk::PipelineStageFlags::empty(),
        image_barriers: Vec::new(),
        buffer_barriers: Vec::new(),
    };

    for &(target, before, after) in transitions {
        let uav_hazard = before == ResourceState::UNORDERED_ACCESS
            && after == ResourceState::UNORDERED_ACCESS;

        let (src_access, dst_access) = if uav_hazard {
            (
                vk::AccessFlags::SHADER_WRITE,
                vk::AccessFlags::SHADER_WRITE | vk::AccessFlags::SHADER_READ,
            )
        } else {
            (access_mask(before), access_mask(after))
        };

        batch.src_stages |= pipeline_stages(src_access, queue);
        batch.dst_stages |= pipeline_stages(dst_access, queue);

        match target {
            BarrierTarget::Image {
                image,
                aspect,
                mip_levels,
                array_layers,
            } => {
                let (old_layout, new_layout) = if uav_hazard {
                    (vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL)
                } else {
                    let old = if before == ResourceState::COMMON {
                        vk::ImageLayout::UNDEFINED
                    } else {
                        image_layout(before)
                    };
                    (old, image_layout(after))
                };

                batch.image_barriers.push(
                    vk::ImageMemoryBarrier::builder()
                        .src_access_mask(src_access)
                        .dst_access_mask(dst_access)
                        .old_layout(old_layout)
                        .new_layout(new_layout)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .image(image)
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: aspect,
                            base_mip_level: 0,
                            level_count: mip_levels,
                            base_array_layer: 0,
                            layer_count: array_layers,
                        })
                        .build(),
                );
            }
            BarrierTarget::Buffer { buffer, size } => {
                batch.buffer_barriers.push(
                    vk::BufferMemoryBarrier::builder()
                        .src_access_mask(src_access)
                        .dst_access_mask(dst_access)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .buffer(buffer)
                        .offset(0)
                        .size(size)
                        .build(),
                );
            }
        }
    }

    // Empty stage masks are invalid; fall back to the pipe endpoints
    if batch.src_stages.is_empty() {
        batch.src_stages = vk::PipelineStageFlags::TOP_OF_PIPE;
    }
    if batch.dst_stages.is_empty() {
        batch.dst_stages = vk::PipelineStageFlags::BOTTOM_OF_PIPE;
    }
    batch
}

/// Record a planned batch into a command buffer
pub fn record_barriers(device: &Device, command_buffer: vk::CommandBuffer, batch: &BarrierBatch) {
    if batch.image_barriers.is_empty() && batch.buffer_barriers.is_empty() {
        return;
    }
    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            batch.src_stages,
            batch.dst_stages,
            vk::DependencyFlags::empty(),
            &[],
            &batch.buffer_barriers,
            &batch.image_barriers,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_target() -> BarrierTarget {
        BarrierTarget::Image {
            image: vk::Image::null(),
            aspect: vk::ImageAspectFlags::COLOR,
            mip_levels: 1,
            array_layers: 1,
        }
    }

    #[test]
    fn test_uav_hazard_is_not_a_layout_transition() {
        let batch = plan_barriers(
            &[(
                image_target(),
                ResourceState::UNORDERED_ACCESS,
                ResourceState::UNORDERED_ACCESS,
            )],
            QueueKind::Graphics,
        );

        let barrier = &batch.image_barriers[0];
        assert_eq!(barrier.old_layout, vk::ImageLayout::GENERAL);
        assert_eq!(barrier.new_layout, vk::ImageLayout::GENERAL);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags::SHADER_WRITE);
        assert_eq!(
            barrier.dst_access_mask,
            vk::AccessFlags::SHADER_WRITE | vk::AccessFlags::SHADER_READ
        );
    }

    #[test]
    fn test_copy_dest_to_shader_resource() {
        let batch = plan_barriers(
            &[(
                image_target(),
                ResourceState::COPY_DEST,
                ResourceState::PIXEL_SHADER_RESOURCE,
            )],
            QueueKind::Graphics,
        );

        let barrier = &batch.image_barriers[0];
        assert_eq!(barrier.old_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert!(batch.src_stages.contains(vk::PipelineStageFlags::TRANSFER));
        assert!(batch
            .dst_stages
            .contains(vk::PipelineStageFlags::FRAGMENT_SHADER));
    }

    #[test]
    fn test_common_before_state_discards_contents() {
        let batch = plan_barriers(
            &[(image_target(), ResourceState::COMMON, ResourceState::COPY_DEST)],
            QueueKind::Transfer,
        );
        assert_eq!(batch.image_barriers[0].old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(
            batch.image_barriers[0].new_layout,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        );
    }

    #[test]
    fn test_transfer_queue_collapses_to_all_commands() {
        let stages = pipeline_stages(vk::AccessFlags::SHADER_READ, QueueKind::Transfer);
        assert_eq!(stages, vk::PipelineStageFlags::ALL_COMMANDS);
    }

    #[test]
    fn test_compute_queue_uses_compute_stage() {
        let stages = pipeline_stages(vk::AccessFlags::SHADER_READ, QueueKind::Compute);
        assert_eq!(stages, vk::PipelineStageFlags::COMPUTE_SHADER);
    }

    #[test]
    fn test_batch_accumulates_stage_masks() {
        let buffer_target = BarrierTarget::Buffer {
            buffer: vk::Buffer::null(),
            size: 64,
        };
        let batch = plan_barriers(
            &[
                (
                    image_target(),
                    ResourceState::RENDER_TARGET,
                    ResourceState::PIXEL_SHADER_RESOURCE,
                ),
                (
                    buffer_target,
                    ResourceState::COPY_DEST,
                    ResourceState::VERTEX_AND_CONSTANT_BUFFER,
                ),
            ],
            QueueKind::Graphics,
        );

        assert_eq!(batch.image_barriers.len(), 1);
        assert_eq!(batch.buffer_barriers.len(), 1);
        // Both transitions contribute to the single pair of masks
        assert!(batch
            .src_stages
            .contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT));
        assert!(batch.src_stages.contains(vk::PipelineStageFlags::TRANSFER));
        assert!(batch
            .dst_stages
            .contains(vk::PipelineStageFlags::FRAGMENT_SHADER));
        assert!(batch
            .dst_stages
            .contains(vk::PipelineStageFlags::VERTEX_INPUT));
    }

    #[test]
    fn test_upload_batch_covers_staging_and_destination() {
        // The pre-copy batch readies the staging buffer for reads and
        // the destination image for writes in one call
        let staging = BarrierTarget::Buffer {
            buffer: vk::Buffer::null(),
            size: 256,
        };
        let batch = plan_barriers(
            &[
                (staging, ResourceState::COMMON, ResourceState::COPY_SOURCE),
                (image_target(), ResourceState::COMMON, ResourceState::COPY_DEST),
            ],
            QueueKind::Transfer,
        );

        assert_eq!(batch.buffer_barriers.len(), 1);
        assert_eq!(batch.image_barriers.len(), 1);
        assert_eq!(
            batch.buffer_barriers[0].dst_access_mask,
            vk::AccessFlags::TRANSFER_READ
        );
        assert_eq!(
            batch.image_barriers[0].dst_access_mask,
            vk::AccessFlags::TRANSFER_WRITE
        );
    }

    #[test]
    fn test_present_state_maps_to_present_layout() {
        let batch = plan_barriers(
            &[(image_target(), ResourceState::RENDER_TARGET, ResourceState::PRESENT)],
            QueueKind::Graphics,
        );
        assert_eq!(
            batch.image_barriers[0].new_layout,
            vk::ImageLayout::PRESENT_SRC_KHR
        );
        // PRESENT has no access; destination stages fall back
        assert_eq!(batch.dst_stages, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
    }
}
