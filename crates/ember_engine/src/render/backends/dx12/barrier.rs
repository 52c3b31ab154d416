//! Resource state translation and batched resource barriers
//!
//! D3D12's state model maps almost bit-for-bit onto the logical
//! states, so translation is a straight accumulation. One batch
//! becomes one `ResourceBarrier` call.

use std::mem::ManuallyDrop;

use windows::Win32::Graphics::Direct3D12::{
    ID3D12GraphicsCommandList, ID3D12Resource, D3D12_RESOURCE_BARRIER, D3D12_RESOURCE_BARRIER_0,
    D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES, D3D12_RESOURCE_BARRIER_FLAG_NONE,
    D3D12_RESOURCE_BARRIER_TYPE_TRANSITION, D3D12_RESOURCE_BARRIER_TYPE_UAV,
    D3D12_RESOURCE_STATES, D3D12_RESOURCE_STATE_COMMON, D3D12_RESOURCE_STATE_COPY_DEST,
    D3D12_RESOURCE_STATE_COPY_SOURCE, D3D12_RESOURCE_STATE_DEPTH_READ,
    D3D12_RESOURCE_STATE_DEPTH_WRITE, D3D12_RESOURCE_STATE_GENERIC_READ,
    D3D12_RESOURCE_STATE_INDEX_BUFFER, D3D12_RESOURCE_STATE_INDIRECT_ARGUMENT,
    D3D12_RESOURCE_STATE_NON_PIXEL_SHADER_RESOURCE, D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
    D3D12_RESOURCE_STATE_PRESENT, D3D12_RESOURCE_STATE_RENDER_TARGET,
    D3D12_RESOURCE_STATE_STREAM_OUT, D3D12_RESOURCE_STATE_UNORDERED_ACCESS,
    D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER, D3D12_UAV_BARRIER,
    D3D12_RESOURCE_TRANSITION_BARRIER,
};

use crate::render::state::ResourceState;

/// Translate logical state bits into D3D12 resource states
pub fn to_dx12_states(state: ResourceState) -> D3D12_RESOURCE_STATES {
    // Exclusive states map to dedicated values; COMMON and PRESENT
    // share the numeric value 0 in D3D12 but stay distinct here
    if state == ResourceState::COMMON {
        return D3D12_RESOURCE_STATE_COMMON;
    }
    if state == ResourceState::PRESENT {
        return D3D12_RESOURCE_STATE_PRESENT;
    }
    if state == ResourceState::GENERIC_READ {
        return D3D12_RESOURCE_STATE_GENERIC_READ;
    }

    let mut states = D3D12_RESOURCE_STATES(0);
    let pairs = [
        (
            ResourceState::VERTEX_AND_CONSTANT_BUFFER,
            D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER,
        ),
        (ResourceState::INDEX_BUFFER, D3D12_RESOURCE_STATE_INDEX_BUFFER),
        (ResourceState::RENDER_TARGET, D3D12_RESOURCE_STATE_RENDER_TARGET),
        (
            ResourceState::UNORDERED_ACCESS,
            D3D12_RESOURCE_STATE_UNORDERED_ACCESS,
        ),
        (ResourceState::DEPTH_WRITE, D3D12_RESOURCE_STATE_DEPTH_WRITE),
        (ResourceState::DEPTH_READ, D3D12_RESOURCE_STATE_DEPTH_READ),
        (
            ResourceState::NON_PIXEL_SHADER_RESOURCE,
            D3D12_RESOURCE_STATE_NON_PIXEL_SHADER_RESOURCE,
        ),
        (
            ResourceState::PIXEL_SHADER_RESOURCE,
            D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
        ),
        (ResourceState::STREAM_OUT, D3D12_RESOURCE_STATE_STREAM_OUT),
        (
            ResourceState::INDIRECT_ARGUMENT,
            D3D12_RESOURCE_STATE_INDIRECT_ARGUMENT,
        ),
        (ResourceState::COPY_DEST, D3D12_RESOURCE_STATE_COPY_DEST),
        (ResourceState::COPY_SOURCE, D3D12_RESOURCE_STATE_COPY_SOURCE),
    ];
    for (bit, native) in pairs {
        if state.contains(bit) {
            states |= native;
        }
    }
    states
}

/// Build one barrier for a transition.
///
/// An unordered-access to unordered-access pair becomes a UAV hazard
/// barrier; a real transition with identical before/after states is
/// invalid in D3D12.
pub fn plan_barrier(
    resource: &ID3D12Resource,
    before: ResourceState,
    after: ResourceState,
) -> D3D12_RESOURCE_BARRIER {
    if before == ResourceState::UNORDERED_ACCESS && after == ResourceState::UNORDERED_ACCESS {
        return D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_UAV,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                UAV: ManuallyDrop::new(D3D12_UAV_BARRIER {
                    pResource: unsafe { std::mem::transmute_copy(resource) },
                }),
            },
        };
    }

    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: unsafe { std::mem::transmute_copy(resource) },
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: to_dx12_states(before),
                StateAfter: to_dx12_states(after),
            }),
        },
    }
}

/// Record a batch of barriers in one call
pub fn record_barriers(command_list: &ID3D12GraphicsCommandList, barriers: &[D3D12_RESOURCE_BARRIER]) {
    if barriers.is_empty() {
        return;
    }
    unsafe { command_list.ResourceBarrier(barriers) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_states_accumulate() {
        let states = to_dx12_states(
            ResourceState::COPY_SOURCE | ResourceState::PIXEL_SHADER_RESOURCE,
        );
        assert_eq!(
            states,
            D3D12_RESOURCE_STATE_COPY_SOURCE | D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE
        );
    }

    #[test]
    fn test_generic_read_maps_to_native_composite() {
        assert_eq!(
            to_dx12_states(ResourceState::GENERIC_READ),
            D3D12_RESOURCE_STATE_GENERIC_READ
        );
    }

    #[test]
    fn test_common_and_present_map_to_zero() {
        assert_eq!(
            to_dx12_states(ResourceState::COMMON),
            D3D12_RESOURCE_STATE_COMMON
        );
        assert_eq!(
            to_dx12_states(ResourceState::PRESENT),
            D3D12_RESOURCE_STATE_PRESENT
        );
    }
}
