//! DXGI swapchain
//!
//! Flip-model swapchain over the Win32 window handle the surface
//! provider exposes. Presentation is synchronous with a vsync
//! interval of one; the renderer waits its queue idle around every
//! present, so no per-buffer fences exist.

use raw_window_handle::{HasRawWindowHandle, RawWindowHandle};
use windows::core::Interface;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D12::{ID3D12CommandQueue, ID3D12Resource};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    IDXGIFactory2, IDXGISwapChain3, DXGI_SWAP_CHAIN_DESC1, DXGI_SWAP_EFFECT_FLIP_DISCARD,
    DXGI_USAGE_RENDER_TARGET_OUTPUT,
};

use crate::render::backends::dx12::device::{Dx12Error, Dx12Result};
use crate::render::SurfaceProvider;

const BUFFER_COUNT: u32 = 2;

/// Owned swapchain and its back buffers
pub struct Dx12Swapchain {
    swapchain: IDXGISwapChain3,
    buffers: Vec<ID3D12Resource>,
    extent: (u32, u32),
}

impl Dx12Swapchain {
    /// Create a flip-model swapchain on the window's HWND
    pub fn new(
        factory: &IDXGIFactory2,
        queue: &ID3D12CommandQueue,
        window: &dyn SurfaceProvider,
    ) -> Dx12Result<Self> {
        let hwnd = match window.raw_window_handle() {
            RawWindowHandle::Win32(handle) => HWND(handle.hwnd as isize),
            _ => {
                return Err(Dx12Error::InitializationFailed(
                    "surface provider did not expose a Win32 window handle".to_string(),
                ))
            }
        };

        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: 0,
            Height: 0,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            Stereo: false.into(),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: BUFFER_COUNT,
            Scaling: Default::default(),
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            AlphaMode: Default::default(),
            Flags: 0,
        };

        let swapchain: IDXGISwapChain3 = unsafe {
            factory
                .CreateSwapChainForHwnd(queue, hwnd, &desc, None, None)?
                .cast()?
        };

        let actual = unsafe { swapchain.GetDesc1()? };
        let mut buffers = Vec::with_capacity(BUFFER_COUNT as usize);
        for i in 0..BUFFER_COUNT {
            buffers.push(unsafe { swapchain.GetBuffer::<ID3D12Resource>(i)? });
        }

        log::debug!(
            "swapchain created: {}x{}, {} buffers",
            actual.Width,
            actual.Height,
            BUFFER_COUNT
        );

        Ok(Self {
            swapchain,
            buffers,
            extent: (actual.Width, actual.Height),
        })
    }

    /// Back buffer the next present targets
    pub fn current_buffer(&self) -> &ID3D12Resource {
        let index = unsafe { self.swapchain.GetCurrentBackBufferIndex() } as usize;
        &self.buffers[index]
    }

    /// Present with a vsync interval of one
    pub fn present(&self) -> Dx12Result<()> {
        unsafe { self.swapchain.Present(1, 0).ok()? };
        Ok(())
    }

    /// Current extent
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }
}
