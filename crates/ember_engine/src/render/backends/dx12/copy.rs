//! Synchronous copy engine on the copy queue
//!
//! One command list, one staging allocation per upload, one upload in
//! flight. After the fence wait the staging buffer drops. Resources
//! written on a copy queue decay to the common state when its fence
//! signals, so no end-of-upload barrier is recorded here; the
//! renderer transitions the destination from common to its declared
//! resting state on the direct queue afterwards.

use windows::core::Interface;
use windows::Win32::Graphics::Direct3D12::{
    ID3D12CommandAllocator, ID3D12Device, ID3D12GraphicsCommandList,
    D3D12_COMMAND_LIST_TYPE_COPY, D3D12_HEAP_TYPE_UPLOAD, D3D12_PLACED_SUBRESOURCE_FOOTPRINT,
    D3D12_RESOURCE_FLAG_NONE, D3D12_RESOURCE_STATE_GENERIC_READ, D3D12_TEXTURE_COPY_LOCATION,
    D3D12_TEXTURE_COPY_LOCATION_0, D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
    D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
};

use crate::assets::TextureDescription;
use crate::render::backends::dx12::device::{Dx12Error, Dx12Result, Queue};
use crate::render::backends::dx12::resources::{alloc_buffer, Dx12Buffer, Dx12Texture};

/// Staging-upload engine bound to the copy queue
pub struct CopyEngine {
    queue: Queue,
    allocator: ID3D12CommandAllocator,
    command_list: ID3D12GraphicsCommandList,
}

impl CopyEngine {
    /// Create the copy queue, allocator and command list
    pub fn new(device: &ID3D12Device) -> Dx12Result<Self> {
        let queue = Queue::new(device, D3D12_COMMAND_LIST_TYPE_COPY)?;
        let allocator: ID3D12CommandAllocator =
            unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_COPY)? };
        let command_list: ID3D12GraphicsCommandList = unsafe {
            device.CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_COPY, &allocator, None)?
        };
        unsafe { command_list.Close()? };

        Ok(Self {
            queue,
            allocator,
            command_list,
        })
    }

    /// Copy bytes into a default-heap buffer through an upload-heap
    /// staging buffer. Blocks until the copy queue drains. Empty
    /// payloads are a no-op.
    pub fn upload_buffer(
        &mut self,
        device: &ID3D12Device,
        dst: &Dx12Buffer,
        bytes: &[u8],
    ) -> Dx12Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        if bytes.len() as u64 > dst.size() {
            return Err(Dx12Error::InvalidOperation {
                reason: format!(
                    "upload of {} bytes exceeds buffer size {}",
                    bytes.len(),
                    dst.size()
                ),
            });
        }

        let staging = alloc_buffer(
            device,
            D3D12_HEAP_TYPE_UPLOAD,
            bytes.len() as u64,
            D3D12_RESOURCE_STATE_GENERIC_READ,
            D3D12_RESOURCE_FLAG_NONE,
        )?;
        unsafe {
            let mut mapped = std::ptr::null_mut();
            staging.Map(0, None, Some(&mut mapped))?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
            staging.Unmap(0, None);
        }

        unsafe {
            self.allocator.Reset()?;
            self.command_list.Reset(&self.allocator, None)?;
            self.command_list
                .CopyBufferRegion(dst.resource(), 0, &staging, 0, bytes.len() as u64);
            self.command_list.Close()?;
        }

        let submission = self.queue.submit(&self.command_list.cast()?)?;
        self.queue.wait(submission)
    }

    /// Copy decoded texture data into a texture, one region per
    /// (slice, mip) record. Row data is repacked to the 256-byte
    /// pitch alignment placed footprints require. Blocks until the
    /// copy queue drains.
    pub fn upload_texture(
        &mut self,
        device: &ID3D12Device,
        dst: &Dx12Texture,
        description: &TextureDescription,
        bytes: &[u8],
    ) -> Dx12Result<()> {
        if description.images.is_empty() {
            return Ok(());
        }

        let resource_desc = unsafe { dst.resource().GetDesc() };
        let subresources = (dst.mip_levels() * dst.array_layers()) as usize;
        let mut layouts = vec![D3D12_PLACED_SUBRESOURCE_FOOTPRINT::default(); subresources];
        let mut num_rows = vec![0u32; subresources];
        let mut row_sizes = vec![0u64; subresources];
        let mut total_bytes = 0u64;
        unsafe {
            device.GetCopyableFootprints(
                &resource_desc,
                0,
                subresources as u32,
                0,
                Some(layouts.as_mut_ptr()),
                Some(num_rows.as_mut_ptr()),
                Some(row_sizes.as_mut_ptr()),
                Some(&mut total_bytes),
            );
        }

        let staging = alloc_buffer(
            device,
            D3D12_HEAP_TYPE_UPLOAD,
            total_bytes,
            D3D12_RESOURCE_STATE_GENERIC_READ,
            D3D12_RESOURCE_FLAG_NONE,
        )?;

        let mapped = unsafe {
            let mut mapped = std::ptr::null_mut();
            staging.Map(0, None, Some(&mut mapped))?;
            mapped.cast::<u8>()
        };

        for image in &description.images {
            let end = image.offset + image.len;
            if end > bytes.len() {
                unsafe { staging.Unmap(0, None) };
                return Err(Dx12Error::InvalidOperation {
                    reason: format!(
                        "image range {}..{} exceeds source buffer of {} bytes",
                        image.offset,
                        end,
                        bytes.len()
                    ),
                });
            }

            let subresource = (image.array_layer * dst.mip_levels() + image.mip_level) as usize;
            let layout = &layouts[subresource];
            let dst_row_pitch = layout.Footprint.RowPitch as usize;
            let rows_per_slice = num_rows[subresource] as usize;
            let copy_bytes = (row_sizes[subresource] as usize).min(image.row_pitch);

            for z in 0..image.depth as usize {
                for row in 0..rows_per_slice {
                    let src_offset = image.offset + (z * rows_per_slice + row) * image.row_pitch;
                    let dst_offset = layout.Offset as usize
                        + (z * rows_per_slice + row) * dst_row_pitch;
                    unsafe {
                        std::ptr::copy_nonoverlapping(
                            bytes.as_ptr().add(src_offset),
                            mapped.add(dst_offset),
                            copy_bytes,
                        );
                    }
                }
            }
        }
        unsafe { staging.Unmap(0, None) };

        unsafe {
            self.allocator.Reset()?;
            self.command_list.Reset(&self.allocator, None)?;
        }

        for image in &description.images {
            let subresource = image.array_layer * dst.mip_levels() + image.mip_level;
            let src = D3D12_TEXTURE_COPY_LOCATION {
                pResource: unsafe { std::mem::transmute_copy(&staging) },
                Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                    PlacedFootprint: layouts[subresource as usize],
                },
            };
            let dst_location = D3D12_TEXTURE_COPY_LOCATION {
                pResource: unsafe { std::mem::transmute_copy(dst.resource()) },
                Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                    SubresourceIndex: subresource,
                },
            };
            unsafe {
                self.command_list
                    .CopyTextureRegion(&dst_location, 0, 0, 0, &src, None);
            }
        }

        unsafe { self.command_list.Close()? };
        let submission = self.queue.submit(&self.command_list.cast()?)?;
        self.queue.wait(submission)
    }
}
