//! Descriptor heaps with free-list index allocation
//!
//! One fixed-capacity heap per descriptor type. Slot indices come
//! from an index pool that reuses freed slots in LIFO order before
//! touching fresh ones, so heaps never fragment and never grow.
//! Shader-visible heaps work the same way; descriptors written to a
//! CPU heap reach the GPU heap through `CopyDescriptorsSimple`.

use windows::Win32::Graphics::Direct3D12::{
    ID3D12DescriptorHeap, ID3D12Device, D3D12_CPU_DESCRIPTOR_HANDLE, D3D12_DESCRIPTOR_HEAP_DESC,
    D3D12_DESCRIPTOR_HEAP_FLAG_NONE, D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
    D3D12_DESCRIPTOR_HEAP_TYPE, D3D12_GPU_DESCRIPTOR_HANDLE,
};

use crate::render::backends::dx12::device::Dx12Result;
use crate::util::{IndexPool, IndexPoolError};

/// A fixed-capacity descriptor heap and its slot allocator
pub struct DescriptorHeap {
    heap: ID3D12DescriptorHeap,
    kind: D3D12_DESCRIPTOR_HEAP_TYPE,
    cpu_start: D3D12_CPU_DESCRIPTOR_HANDLE,
    gpu_start: D3D12_GPU_DESCRIPTOR_HANDLE,
    handle_size: u32,
    slots: IndexPool,
}

impl DescriptorHeap {
    /// Create a heap of the given type and capacity
    pub fn new(
        device: &ID3D12Device,
        kind: D3D12_DESCRIPTOR_HEAP_TYPE,
        capacity: u32,
        shader_visible: bool,
    ) -> Dx12Result<Self> {
        let desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: kind,
            NumDescriptors: capacity,
            Flags: if shader_visible {
                D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
            } else {
                D3D12_DESCRIPTOR_HEAP_FLAG_NONE
            },
            NodeMask: 0,
        };

        let heap: ID3D12DescriptorHeap = unsafe { device.CreateDescriptorHeap(&desc)? };
        let cpu_start = unsafe { heap.GetCPUDescriptorHandleForHeapStart() };
        let gpu_start = if shader_visible {
            unsafe { heap.GetGPUDescriptorHandleForHeapStart() }
        } else {
            D3D12_GPU_DESCRIPTOR_HANDLE { ptr: 0 }
        };
        let handle_size = unsafe { device.GetDescriptorHandleIncrementSize(kind) };

        Ok(Self {
            heap,
            kind,
            cpu_start,
            gpu_start,
            handle_size,
            slots: IndexPool::new(capacity),
        })
    }

    /// Allocate one slot, reusing the most recently freed one first
    pub fn allocate(&mut self) -> Result<u32, IndexPoolError> {
        self.slots.allocate()
    }

    /// Return a slot to the free list
    pub fn release(&mut self, index: u32) -> Result<(), IndexPoolError> {
        self.slots.release(index)
    }

    /// CPU handle for a slot
    pub fn cpu_handle(&self, index: u32) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: self.cpu_start.ptr + index as usize * self.handle_size as usize,
        }
    }

    /// GPU handle for a slot; zero for CPU-only heaps
    pub fn gpu_handle(&self, index: u32) -> D3D12_GPU_DESCRIPTOR_HANDLE {
        D3D12_GPU_DESCRIPTOR_HANDLE {
            ptr: self.gpu_start.ptr + index as u64 * self.handle_size as u64,
        }
    }

    /// Native heap, needed for `SetDescriptorHeaps`
    pub fn heap(&self) -> &ID3D12DescriptorHeap {
        &self.heap
    }

    /// Heap type
    pub fn kind(&self) -> D3D12_DESCRIPTOR_HEAP_TYPE {
        self.kind
    }

    /// Copy one descriptor from a CPU-visible heap into this heap
    pub fn copy_from(
        &self,
        device: &ID3D12Device,
        dst_index: u32,
        src: D3D12_CPU_DESCRIPTOR_HANDLE,
    ) {
        unsafe {
            device.CopyDescriptorsSimple(1, self.cpu_handle(dst_index), src, self.kind);
        }
    }
}
