//! Direct3D 12 device initialization and queue wrappers
//!
//! Each queue pairs an `ID3D12CommandQueue` with a fence and a Win32
//! event so the CPU can block on any submission. Fence values are a
//! monotonically increasing submission counter.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL_12_0;
use windows::Win32::Graphics::Direct3D12::{
    D3D12CreateDevice, D3D12GetDebugInterface, ID3D12CommandList, ID3D12CommandQueue, ID3D12Debug,
    ID3D12Device, ID3D12Fence, D3D12_COMMAND_LIST_TYPE, D3D12_COMMAND_QUEUE_DESC,
    D3D12_COMMAND_QUEUE_FLAG_NONE, D3D12_FENCE_FLAG_NONE,
};
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory2, IDXGIAdapter1, IDXGIFactory2, DXGI_CREATE_FACTORY_DEBUG,
};
use windows::Win32::System::Threading::{CreateEventW, WaitForSingleObject, INFINITE};

use crate::config::RendererConfig;

/// DirectX 12 backend errors
#[derive(Debug, Error)]
pub enum Dx12Error {
    /// General D3D12/DXGI API error
    #[error("D3D12 API error: {0}")]
    Api(#[from] windows::core::Error),

    /// Device initialization failed
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid operation attempted
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

/// Result type for DirectX 12 operations
pub type Dx12Result<T> = Result<T, Dx12Error>;

/// Identifier of one queue submission, usable for CPU waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubmitId(pub u64);

/// A command queue with its fence and wait event
pub struct Queue {
    queue: ID3D12CommandQueue,
    fence: ID3D12Fence,
    fence_event: HANDLE,
    num_submitted: AtomicU64,
}

impl Queue {
    /// Create a queue of the given command-list type
    pub fn new(device: &ID3D12Device, kind: D3D12_COMMAND_LIST_TYPE) -> Dx12Result<Self> {
        let queue: ID3D12CommandQueue = unsafe {
            device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
                Type: kind,
                Priority: 0,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                NodeMask: 0,
            })?
        };
        let fence: ID3D12Fence = unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE)? };
        let fence_event = unsafe { CreateEventW(None, false, false, None)? };

        Ok(Self {
            queue,
            fence,
            fence_event,
            num_submitted: AtomicU64::new(0),
        })
    }

    /// Native queue handle
    pub fn handle(&self) -> &ID3D12CommandQueue {
        &self.queue
    }

    /// Execute a command list and signal the fence behind it
    pub fn submit(&self, commands: &ID3D12CommandList) -> Dx12Result<SubmitId> {
        let signal = self.num_submitted.fetch_add(1, Ordering::SeqCst) + 1;
        unsafe {
            self.queue.ExecuteCommandLists(&[Some(commands.clone())]);
            self.queue.Signal(&self.fence, signal)?;
        }
        Ok(SubmitId(signal))
    }

    /// Block until the given submission has completed. Unbounded wait.
    pub fn wait(&self, submission: SubmitId) -> Dx12Result<()> {
        if unsafe { self.fence.GetCompletedValue() } >= submission.0 {
            return Ok(());
        }
        unsafe {
            self.fence
                .SetEventOnCompletion(submission.0, self.fence_event)?;
            WaitForSingleObject(self.fence_event, INFINITE);
        }
        Ok(())
    }

    /// Block until every submission has completed.
    ///
    /// Signals one extra fence value first: DXGI may submit work on
    /// the queue during `Present`, and that work must drain too.
    pub fn wait_idle(&self) -> Dx12Result<()> {
        let signal = self.num_submitted.fetch_add(1, Ordering::SeqCst) + 1;
        unsafe { self.queue.Signal(&self.fence, signal)? };
        self.wait(SubmitId(signal))
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        let _ = self.wait_idle();
        unsafe {
            let _ = CloseHandle(self.fence_event);
        }
    }
}

/// Owned DXGI factory, adapter, device and queues
pub struct Dx12Device {
    factory: IDXGIFactory2,
    device: ID3D12Device,
}

impl Dx12Device {
    /// Create the factory and device, enabling the debug layer when
    /// validation is requested
    pub fn new(config: &RendererConfig) -> Dx12Result<Self> {
        let mut factory_flags = 0;
        if config.enable_validation {
            let mut debug: Option<ID3D12Debug> = None;
            if unsafe { D3D12GetDebugInterface(&mut debug) }.is_ok() {
                if let Some(debug) = debug {
                    unsafe { debug.EnableDebugLayer() };
                    factory_flags = DXGI_CREATE_FACTORY_DEBUG;
                    log::info!("enabling D3D12 debug layer");
                }
            }
        }

        let factory: IDXGIFactory2 = unsafe { CreateDXGIFactory2(factory_flags)? };

        let adapter: IDXGIAdapter1 = unsafe { factory.EnumAdapters1(0) }.map_err(|_| {
            Dx12Error::InitializationFailed("no DXGI adapters found".to_string())
        })?;

        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_12_0, &mut device)? };
        let device = device.ok_or_else(|| {
            Dx12Error::InitializationFailed("D3D12CreateDevice returned no device".to_string())
        })?;

        let description = unsafe { adapter.GetDesc1() }?;
        let name_end = description
            .Description
            .iter()
            .position(|c| *c == 0)
            .unwrap_or(description.Description.len());
        log::info!(
            "selected D3D12 adapter: {}",
            String::from_utf16_lossy(&description.Description[..name_end])
        );

        Ok(Self { factory, device })
    }

    /// DXGI factory
    pub fn factory(&self) -> &IDXGIFactory2 {
        &self.factory
    }

    /// D3D12 device
    pub fn device(&self) -> &ID3D12Device {
        &self.device
    }
}
