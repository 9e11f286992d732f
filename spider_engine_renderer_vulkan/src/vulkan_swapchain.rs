/// Swapchain - presentation surface of the Vulkan device
///
/// Internal to the backend: the device acquires an image when a frame opens
/// its surface pass and presents it after the frame's submit. Recreated on
/// resize, on a vsync change and whenever the surface reports itself out of
/// date.

use ash::vk;
use spider_engine::spider::{Error, Result};
use spider_engine::{engine_debug, engine_err, engine_warn};
use std::sync::Arc;

use crate::vulkan_context::{device_error, GpuContext, SOURCE};
use crate::vulkan_format::{select_present_mode, select_surface_format};

/// Surface format used when the surface offers it
pub(crate) const PREFERRED_SURFACE_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;

/// Image extent for a window size
///
/// Most platforms fix the extent to the window (`current_extent`); the
/// others report `u32::MAX` and let the swapchain pick within limits.
pub(crate) fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One image more than the minimum, within the surface maximum (0 = unbounded)
pub(crate) fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

/// An acquired surface image
#[derive(Debug, Clone, Copy)]
pub(crate) struct AcquiredImage {
    pub index: u32,
    /// Signaled by the presentation engine once the image is writable
    pub ready: vk::Semaphore,
}

pub(crate) struct Swapchain {
    ctx: Arc<GpuContext>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,

    /// Round-robin acquire semaphores, one more than the image count so a
    /// semaphore is never reused while its acquire may still be pending
    acquire_semaphores: Vec<vk::Semaphore>,
    next_acquire: usize,
    /// One per image, waited on by present
    render_finished: Vec<vk::Semaphore>,
}

impl Swapchain {
    /// Take ownership of `surface` and build the first swapchain on it
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        let loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, surface)
                .map_err(|e| {
                    surface_loader.destroy_surface(surface, None);
                    engine_err!(ctx.console, SOURCE, "Failed to query surface formats: {:?}", e)
                })?
        };
        let format = match select_surface_format(PREFERRED_SURFACE_FORMAT, &formats) {
            Some(format) => format,
            None => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(Error::InitializationFailed("surface reports no formats".to_string()));
            }
        };
        if format.format != PREFERRED_SURFACE_FORMAT {
            engine_warn!(ctx.console, SOURCE, "Surface does not offer {:?}, using {:?}", PREFERRED_SURFACE_FORMAT, format.format);
        }

        // From here on Drop releases the surface and whatever was created
        let mut swapchain = Self {
            ctx,
            surface,
            surface_loader,
            loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            format,
            extent: vk::Extent2D { width, height },
            present_mode: vk::PresentModeKHR::FIFO,
            acquire_semaphores: Vec::new(),
            next_acquire: 0,
            render_finished: Vec::new(),
        };
        let present_mode = swapchain.present_mode_for(vsync)?;
        swapchain.build(width, height, present_mode)?;
        Ok(swapchain)
    }

    pub(crate) fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub(crate) fn format(&self) -> vk::Format {
        self.format.format
    }

    pub(crate) fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub(crate) fn image(&self, index: u32) -> vk::Image {
        self.images[index as usize]
    }

    pub(crate) fn view(&self, index: u32) -> vk::ImageView {
        self.views[index as usize]
    }

    pub(crate) fn render_finished(&self, index: u32) -> vk::Semaphore {
        self.render_finished[index as usize]
    }

    /// Present mode matching `vsync` among the modes the surface supports
    pub(crate) fn present_mode_for(&self, vsync: bool) -> Result<vk::PresentModeKHR> {
        let supported = unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.ctx.physical_device, self.surface)
                .map_err(|e| engine_err!(self.ctx.console, SOURCE, "Failed to query present modes: {:?}", e))?
        };
        Ok(select_present_mode(vsync, &supported))
    }

    /// Acquire the next image, `None` when the swapchain is out of date
    pub(crate) fn acquire(&mut self) -> Result<Option<AcquiredImage>> {
        let ready = self.acquire_semaphores[self.next_acquire];
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, ready, vk::Fence::null())
        };
        match result {
            // Suboptimal images are still presentable; present reports it
            Ok((index, _suboptimal)) => {
                self.next_acquire = (self.next_acquire + 1) % self.acquire_semaphores.len();
                Ok(Some(AcquiredImage { index, ready }))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(e) => Err(device_error(e, "acquire surface image")),
        }
    }

    /// Queue `index` for presentation; returns whether the swapchain should
    /// be recreated
    pub(crate) fn present(&mut self, queue: vk::Queue, index: u32) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [index];
        let wait_semaphores = [self.render_finished[index as usize]];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(device_error(e, "present surface image")),
        }
    }

    /// Rebuild the images for a new size and present mode
    pub(crate) fn recreate(&mut self, width: u32, height: u32, present_mode: vk::PresentModeKHR) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| device_error(e, "wait idle before swapchain recreation"))?;
        }
        self.build(width, height, present_mode)
    }

    fn build(&mut self, width: u32, height: u32, present_mode: vk::PresentModeKHR) -> Result<()> {
        let ctx = self.ctx.clone();
        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, self.surface)
                .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to query surface capabilities: {:?}", e))?
        };

        let extent = choose_extent(&caps, width, height);
        if extent.width == 0 || extent.height == 0 {
            // Minimized: keep the current images until the window comes back
            engine_debug!(ctx.console, SOURCE, "Surface has zero extent, swapchain left as is");
            return Ok(());
        }

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(choose_image_count(&caps))
            .image_format(self.format.format)
            .image_color_space(self.format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        unsafe {
            let swapchain = self
                .loader
                .create_swapchain(&create_info, None)
                .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create swapchain: {:?}", e))?;

            self.release_images();
            if old_swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;
            self.present_mode = present_mode;

            self.images = self
                .loader
                .get_swapchain_images(swapchain)
                .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to get swapchain images: {:?}", e))?;

            for &image in &self.images {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(crate::vulkan_texture::subresource_range(vk::ImageAspectFlags::COLOR));
                let view = ctx
                    .device
                    .create_image_view(&create_info, None)
                    .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create swapchain image view: {:?}", e))?;
                self.views.push(view);
            }

            let semaphore_info = vk::SemaphoreCreateInfo::default();
            for _ in 0..=self.images.len() {
                let semaphore = ctx
                    .device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create acquire semaphore: {:?}", e))?;
                self.acquire_semaphores.push(semaphore);
            }
            for _ in 0..self.images.len() {
                let semaphore = ctx
                    .device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create present semaphore: {:?}", e))?;
                self.render_finished.push(semaphore);
            }
        }
        self.next_acquire = 0;

        engine_debug!(
            ctx.console,
            SOURCE,
            "Swapchain built: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            self.images.len(),
            self.format.format,
            present_mode
        );
        Ok(())
    }

    /// Destroy views and semaphores of the current images
    unsafe fn release_images(&mut self) {
        for semaphore in self.acquire_semaphores.drain(..).chain(self.render_finished.drain(..)) {
            self.ctx.device.destroy_semaphore(semaphore, None);
        }
        for view in self.views.drain(..) {
            self.ctx.device.destroy_image_view(view, None);
        }
        self.images.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            self.release_images();
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 2048 },
            min_image_count: min_images,
            max_image_count: max_images,
            ..Default::default()
        }
    }

    #[test]
    fn test_extent_follows_surface_when_fixed() {
        let extent = choose_extent(&caps((800, 600), 2, 3), 1024, 768);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_extent_clamped_when_surface_defers() {
        let extent = choose_extent(&caps((u32::MAX, u32::MAX), 2, 3), 8000, 0);
        assert_eq!((extent.width, extent.height), (4096, 1));
    }

    #[test]
    fn test_image_count() {
        assert_eq!(choose_image_count(&caps((1, 1), 2, 8)), 3);
        assert_eq!(choose_image_count(&caps((1, 1), 3, 3)), 3);
        assert_eq!(choose_image_count(&caps((1, 1), 2, 0)), 3);
    }
}
