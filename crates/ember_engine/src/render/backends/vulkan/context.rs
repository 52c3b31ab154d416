//! Vulkan instance and device initialization
//!
//! Owns the entry point, instance, physical-device selection and the
//! logical device with its graphics and transfer queues. Everything
//! else in the backend borrows the device from here.

use std::ffi::CStr;

use ash::{extensions::khr, vk, Device, Entry, Instance};
use thiserror::Error;

use crate::config::RendererConfig;
use crate::render::SurfaceProvider;

/// Vulkan backend errors
#[derive(Debug, Error)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for an allocation
    #[error("no suitable memory type found")]
    NoSuitableMemoryType,

    /// Invalid operation attempted
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Device queue selection: family index plus the queue handle
#[derive(Clone, Copy)]
pub struct QueueInfo {
    /// Queue family index
    pub family: u32,
    /// Queue handle
    pub queue: vk::Queue,
}

/// Owned Vulkan instance + device state
pub struct VulkanContext {
    entry: Entry,
    instance: Instance,
    physical_device: vk::PhysicalDevice,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    device: Device,
    graphics: QueueInfo,
    transfer: QueueInfo,
}

impl VulkanContext {
    /// Create the instance and logical device.
    ///
    /// When a surface target is given, the surface and swapchain
    /// extensions are enabled; a headless context skips them.
    pub fn new(config: &RendererConfig, surface: Option<&dyn SurfaceProvider>) -> VulkanResult<Self> {
        let entry = unsafe {
            Entry::load().map_err(|e| {
                VulkanError::InitializationFailed(format!("failed to load Vulkan: {e}"))
            })?
        };

        let app_name = CStr::from_bytes_with_nul(b"ember_engine\0")
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(app_name)
            .engine_name(app_name)
            .api_version(vk::API_VERSION_1_1);

        let mut layer_names: Vec<*const i8> = Vec::new();
        if config.enable_validation {
            log::info!("enabling Vulkan validation layers");
            layer_names.push(VALIDATION_LAYER.as_ptr());
        }

        let mut extension_names: Vec<*const i8> = Vec::new();
        if let Some(surface) = surface {
            let required = ash_window::enumerate_required_extensions(surface.raw_display_handle())
                .map_err(VulkanError::Api)?;
            extension_names.extend_from_slice(required);
        }

        let instance_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        let instance = unsafe {
            entry
                .create_instance(&instance_info, None)
                .map_err(VulkanError::Api)?
        };

        let physical_device = pick_physical_device(&instance)?;
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!("selected Vulkan device: {:?}", device_name);

        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let (graphics_family, transfer_family) = pick_queue_families(&instance, physical_device)?;

        let priorities = [1.0f32];
        let mut queue_infos = vec![vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_family)
            .queue_priorities(&priorities)
            .build()];
        if transfer_family != graphics_family {
            queue_infos.push(
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(transfer_family)
                    .queue_priorities(&priorities)
                    .build(),
            );
        }

        let mut device_extensions: Vec<*const i8> = Vec::new();
        if surface.is_some() {
            device_extensions.push(khr::Swapchain::name().as_ptr());
        }

        let features = vk::PhysicalDeviceFeatures::default();
        let device_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&device_extensions)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .create_device(physical_device, &device_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics = QueueInfo {
            family: graphics_family,
            queue: unsafe { device.get_device_queue(graphics_family, 0) },
        };
        let transfer = QueueInfo {
            family: transfer_family,
            queue: unsafe { device.get_device_queue(transfer_family, 0) },
        };
        if transfer_family == graphics_family {
            log::debug!("no dedicated transfer queue family; sharing the graphics queue");
        }

        Ok(Self {
            entry,
            instance,
            physical_device,
            memory_properties,
            device,
            graphics,
            transfer,
        })
    }

    /// Vulkan entry point
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Instance handle
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Selected physical device
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Graphics queue (the renderer's primary queue)
    pub fn graphics(&self) -> QueueInfo {
        self.graphics
    }

    /// Transfer queue used by the copy engine
    pub fn transfer(&self) -> QueueInfo {
        self.transfer
    }

    /// Cached physical-device memory properties
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Find a memory type index satisfying the filter and properties
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<u32> {
        find_memory_type(&self.memory_properties, type_filter, properties)
    }

    /// Block until the device is idle. Unbounded wait.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Find a memory type index satisfying the filter and properties
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    for i in 0..memory_properties.memory_type_count {
        if type_filter & (1 << i) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
        {
            return Ok(i);
        }
    }
    Err(VulkanError::NoSuitableMemoryType)
}

fn pick_physical_device(instance: &Instance) -> VulkanResult<vk::PhysicalDevice> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .map_err(VulkanError::Api)?
    };
    if devices.is_empty() {
        return Err(VulkanError::InitializationFailed(
            "no Vulkan-capable devices found".to_string(),
        ));
    }

    // Prefer a discrete GPU, fall back to whatever enumerates first
    let discrete = devices.iter().copied().find(|&device| {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    });
    Ok(discrete.unwrap_or(devices[0]))
}

/// Pick the graphics family and, when available, a dedicated
/// transfer-only family for the copy engine
fn pick_queue_families(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
) -> VulkanResult<(u32, u32)> {
    let families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    let graphics = families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .ok_or_else(|| {
            VulkanError::InitializationFailed("no graphics queue family".to_string())
        })? as u32;

    let transfer = families
        .iter()
        .position(|family| {
            family.queue_flags.contains(vk::QueueFlags::TRANSFER)
                && !family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && !family.queue_flags.contains(vk::QueueFlags::COMPUTE)
        })
        .map_or(graphics, |index| index as u32);

    Ok((graphics, transfer))
}
