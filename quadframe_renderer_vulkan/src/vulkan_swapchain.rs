/// Swapchain - Vulkan implementation of the SwapChain trait
///
/// Presentation always uses FIFO, so every present waits for a vertical
/// blank (sync interval 1). Images are acquired with a fence that is
/// waited on immediately: the back buffer index is known as soon as
/// `present` returns, like a flip-model swap chain.

use ash::vk;
use quadframe::graphics_device::{
    PresentFlags, Resource, ResourceDesc, SwapChain, SwapChainDesc, WindowSurface,
};
use quadframe::{qf_bail, qf_debug, qf_err, qf_warn, Error, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::any::Any;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{format_from_vk, format_to_vk};
use crate::vulkan_texture::VulkanTexture;

const SOURCE: &str = "quadframe::vulkan";

pub struct VulkanSwapChain {
    ctx: Arc<GpuContext>,
    queue: vk::Queue,
    surface: vk::SurfaceKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    /// One flag per image, cleared by the first barrier recorded on it
    undefined: Vec<Arc<AtomicBool>>,
    /// Signaled behind the rendering of each image, waited on by present
    render_finished: Vec<vk::Semaphore>,
    acquire_fence: vk::Fence,
    desc: SwapChainDesc,
    current_index: u32,
}

impl VulkanSwapChain {
    /// Create a surface for `window` and a swap chain presenting from `queue`
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        queue: vk::Queue,
        window: &dyn WindowSurface,
        requested: &SwapChainDesc,
    ) -> Result<Self> {
        let display_handle = window
            .display_handle()
            .map_err(|e| Error::InitializationFailed(format!("Window has no display handle: {}", e)))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| Error::InitializationFailed(format!("Window has no window handle: {}", e)))?;

        let instance = &ctx.instance;
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| Error::InitializationFailed(format!("Failed to create window surface: {:?}", e)))?;

        let mut swap_chain = Self {
            swapchain_loader: ash::khr::swapchain::Device::new(&instance.instance, &ctx.device),
            ctx,
            queue,
            surface,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            undefined: Vec::new(),
            render_finished: Vec::new(),
            acquire_fence: vk::Fence::null(),
            desc: *requested,
            current_index: 0,
        };
        // From here on Drop releases whatever was created, surface included
        swap_chain.create_swapchain()?;
        swap_chain.create_images()?;
        swap_chain.acquire_next()?;

        qf_debug!(
            SOURCE,
            "Swapchain created: {}x{} {:?}, {} images",
            swap_chain.desc.width,
            swap_chain.desc.height,
            swap_chain.desc.format,
            swap_chain.images.len()
        );
        Ok(swap_chain)
    }

    fn create_swapchain(&mut self) -> Result<()> {
        let surface_loader = &self.ctx.instance.surface_loader;
        let physical_device = self.ctx.physical_device;

        unsafe {
            let supported = surface_loader
                .get_physical_device_surface_support(physical_device, self.ctx.graphics_queue_family, self.surface)
                .map_err(|e| qf_err!(SOURCE, "Failed to query surface support: {:?}", e))?;
            if !supported {
                return Err(Error::UnsupportedCapability(
                    "graphics queue cannot present to this window".to_string(),
                ));
            }

            let capabilities = surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .map_err(|e| qf_err!(SOURCE, "Failed to get surface capabilities: {:?}", e))?;
            let surface_formats = surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)
                .map_err(|e| qf_err!(SOURCE, "Failed to get surface formats: {:?}", e))?;

            let (surface_format, format) = choose_surface_format(&surface_formats, &self.desc)?;
            let extent = choose_extent(&capabilities, &self.desc);
            let image_count = choose_image_count(&capabilities, self.desc.buffer_count);

            let composite_alpha = if capabilities
                .supported_composite_alpha
                .contains(vk::CompositeAlphaFlagsKHR::OPAQUE)
            {
                vk::CompositeAlphaFlagsKHR::OPAQUE
            } else {
                vk::CompositeAlphaFlagsKHR::INHERIT
            };

            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(image_count)
                .image_format(surface_format.format)
                .image_color_space(surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(composite_alpha)
                .present_mode(vk::PresentModeKHR::FIFO)
                .clipped(true);

            self.swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e)))?;

            self.desc.width = extent.width;
            self.desc.height = extent.height;
            self.desc.format = format;
        }
        Ok(())
    }

    fn create_images(&mut self) -> Result<()> {
        unsafe {
            self.images = self
                .swapchain_loader
                .get_swapchain_images(self.swapchain)
                .map_err(|e| qf_err!(SOURCE, "Failed to get swapchain images: {:?}", e))?;
            self.desc.buffer_count = self.images.len() as u32;
            self.undefined = self.images.iter().map(|_| Arc::new(AtomicBool::new(true))).collect();

            for _ in 0..self.images.len() {
                let semaphore = self
                    .ctx
                    .device
                    .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                    .map_err(|e| qf_err!(SOURCE, "Failed to create semaphore: {:?}", e))?;
                self.render_finished.push(semaphore);
            }

            self.acquire_fence = self
                .ctx
                .device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| qf_err!(SOURCE, "Failed to create acquire fence: {:?}", e))?;
        }
        Ok(())
    }

    /// Acquire the next image and wait until it can be rendered to
    fn acquire_next(&mut self) -> Result<()> {
        unsafe {
            let (index, suboptimal) = self
                .swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, vk::Semaphore::null(), self.acquire_fence)
                .map_err(|e| qf_err!(SOURCE, "Failed to acquire swapchain image: {:?}", e))?;
            if suboptimal {
                qf_warn!(SOURCE, "Swapchain no longer matches the surface");
            }

            self.ctx
                .device
                .wait_for_fences(&[self.acquire_fence], true, u64::MAX)
                .map_err(|e| qf_err!(SOURCE, "Failed to wait for image acquisition: {:?}", e))?;
            self.ctx
                .device
                .reset_fences(&[self.acquire_fence])
                .map_err(|e| qf_err!(SOURCE, "Failed to reset acquire fence: {:?}", e))?;

            self.current_index = index;
        }
        Ok(())
    }
}

fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    requested: &SwapChainDesc,
) -> Result<(vk::SurfaceFormatKHR, quadframe::graphics_device::Format)> {
    let wanted = format_to_vk(requested.format);
    if let Some(exact) = available.iter().find(|f| f.format == wanted) {
        return Ok((*exact, requested.format));
    }

    let fallback = available.iter().find_map(|f| {
        format_from_vk(f.format)
            .filter(|format| format.is_color_target())
            .map(|format| (*f, format))
    });
    match fallback {
        Some((surface_format, format)) => {
            qf_warn!(
                SOURCE,
                "Surface does not support {:?}, presenting as {:?}",
                requested.format,
                format
            );
            Ok((surface_format, format))
        }
        None => Err(Error::UnsupportedCapability(format!(
            "surface supports none of the back buffer formats (requested {:?})",
            requested.format
        ))),
    }
}

fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: &SwapChainDesc) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: requested
            .width
            .clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: requested
            .height
            .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let count = requested.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

impl SwapChain for VulkanSwapChain {
    fn desc(&self) -> Result<SwapChainDesc> {
        Ok(self.desc)
    }

    fn buffer(&self, index: u32) -> Result<Box<dyn Resource>> {
        let Some(&image) = self.images.get(index as usize) else {
            qf_bail!(SOURCE, "Back buffer {} out of range ({} images)", index, self.images.len());
        };
        let desc = ResourceDesc::texture_2d(self.desc.width, self.desc.height, self.desc.format, 1, 1);
        Ok(Box::new(VulkanTexture::from_swap_chain(
            self.ctx.clone(),
            image,
            desc,
            self.undefined[index as usize].clone(),
        )))
    }

    fn current_back_buffer_index(&self) -> Result<u32> {
        Ok(self.current_index)
    }

    /// `sync_interval` values other than 1 are presented as 1 (FIFO);
    /// `flags` are accepted but presentation always blocks.
    fn present(&mut self, _sync_interval: u32, _flags: PresentFlags) -> Result<()> {
        let index = self.current_index;
        let render_finished = [self.render_finished[index as usize]];

        unsafe {
            // Orders presentation behind everything already submitted to the queue
            let signal = vk::SubmitInfo::default().signal_semaphores(&render_finished);
            self.ctx
                .device
                .queue_submit(self.queue, &[signal], vk::Fence::null())
                .map_err(|e| qf_err!(SOURCE, "Failed to submit present signal: {:?}", e))?;

            let swapchains = [self.swapchain];
            let image_indices = [index];
            let present_info = vk::PresentInfoKHR::default()
                .wait_semaphores(&render_finished)
                .swapchains(&swapchains)
                .image_indices(&image_indices);

            match self.swapchain_loader.queue_present(self.queue, &present_info) {
                Ok(false) => {}
                Ok(true) => qf_warn!(SOURCE, "Presented to a suboptimal swapchain"),
                Err(e) => qf_bail!(SOURCE, "Failed to present image {}: {:?}", index, e),
            }
        }

        self.acquire_next()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSwapChain {
    fn drop(&mut self) {
        unsafe {
            let _ = self.ctx.device.queue_wait_idle(self.queue);
            for &semaphore in &self.render_finished {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            if self.acquire_fence != vk::Fence::null() {
                self.ctx.device.destroy_fence(self.acquire_fence, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.ctx.instance.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
