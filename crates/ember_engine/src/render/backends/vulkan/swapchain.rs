//! Surface and swapchain management
//!
//! Minimal presentation path: FIFO present mode, one acquire
//! semaphore, no frames-in-flight pipelining. The renderer submits
//! and waits synchronously, so acquire/present never overlap.

use ash::extensions::khr;
use ash::{vk, Device, Entry, Instance};

use crate::render::backends::vulkan::context::{VulkanError, VulkanResult};
use crate::render::SurfaceProvider;

/// Owned surface, swapchain and presentation images
pub struct VulkanSwapchain {
    device: Device,
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
    swapchain_loader: khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
}

impl VulkanSwapchain {
    /// Create the surface and swapchain for a window
    pub fn new(
        entry: &Entry,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        device: &Device,
        graphics_family: u32,
        window: &dyn SurfaceProvider,
    ) -> VulkanResult<Self> {
        let surface_loader = khr::Surface::new(entry, instance);
        let surface = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
            .map_err(VulkanError::Api)?
        };

        let supported = unsafe {
            surface_loader
                .get_physical_device_surface_support(physical_device, graphics_family, surface)
                .map_err(VulkanError::Api)?
        };
        if !supported {
            unsafe { surface_loader.destroy_surface(surface, None) };
            return Err(VulkanError::InitializationFailed(
                "graphics queue family cannot present to the surface".to_string(),
            ));
        }

        let capabilities = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(VulkanError::Api)?
        };

        let format = formats
            .iter()
            .copied()
            .find(|f| {
                f.format == vk::Format::B8G8R8A8_SRGB
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .unwrap_or(formats[0]);

        let extent = capabilities.current_extent;
        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        let swapchain_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true);

        let swapchain_loader = khr::Swapchain::new(instance, device);
        let swapchain = unsafe {
            match swapchain_loader.create_swapchain(&swapchain_info, None) {
                Ok(swapchain) => swapchain,
                Err(e) => {
                    surface_loader.destroy_surface(surface, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        let images = unsafe {
            match swapchain_loader.get_swapchain_images(swapchain) {
                Ok(images) => images,
                Err(e) => {
                    swapchain_loader.destroy_swapchain(swapchain, None);
                    surface_loader.destroy_surface(surface, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        let image_available = unsafe {
            match device.create_semaphore(&vk::SemaphoreCreateInfo::builder(), None) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    swapchain_loader.destroy_swapchain(swapchain, None);
                    surface_loader.destroy_surface(surface, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };
        let render_finished = unsafe {
            match device.create_semaphore(&vk::SemaphoreCreateInfo::builder(), None) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    device.destroy_semaphore(image_available, None);
                    swapchain_loader.destroy_swapchain(swapchain, None);
                    surface_loader.destroy_surface(surface, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        log::debug!(
            "swapchain created: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            images.len(),
            format.format
        );

        Ok(Self {
            device: device.clone(),
            surface_loader,
            surface,
            swapchain_loader,
            swapchain,
            images,
            format,
            extent,
            image_available,
            render_finished,
        })
    }

    /// Acquire the next presentation image. Unbounded wait.
    pub fn acquire_next_image(&self) -> VulkanResult<u32> {
        let (index, _suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(
                    self.swapchain,
                    u64::MAX,
                    self.image_available,
                    vk::Fence::null(),
                )
                .map_err(VulkanError::Api)?
        };
        Ok(index)
    }

    /// Semaphore signaled when an acquired image is ready for writes
    pub fn image_available(&self) -> vk::Semaphore {
        self.image_available
    }

    /// Semaphore presentation waits on; the renderer signals it from
    /// the submit that finishes rendering to the image
    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished
    }

    /// Queue the image for presentation, waiting on the
    /// render-finished semaphore
    pub fn present(&self, queue: vk::Queue, image_index: u32) -> VulkanResult<()> {
        let wait_semaphores = [self.render_finished];
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);
        unsafe {
            self.swapchain_loader
                .queue_present(queue, &present_info)
                .map_err(VulkanError::Api)?;
        }
        Ok(())
    }

    /// Presentation image for an acquired index
    pub fn image(&self, index: u32) -> vk::Image {
        self.images[index as usize]
    }

    /// Surface format the swapchain was built with
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Current extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.render_finished, None);
            self.device.destroy_semaphore(self.image_available, None);
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
