/// Texture - Vulkan implementation of the Texture trait
///
/// Images are device-local, single mip, single layer. Color textures start
/// in `UNDEFINED` layout and are moved to `SHADER_READ_ONLY_OPTIMAL` by the
/// command that fills them (`copy_buffer_to_texture`).

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use spider_engine::spider::render::{Texture as RendererTexture, TextureDesc};
use spider_engine::spider::{Error, Result};
use spider_engine::{engine_err, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::texture_format_to_vk;

/// Vulkan texture implementation
pub struct Texture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    desc: TextureDesc,
}

impl Texture {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &TextureDesc) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "texture size must be non-zero (got {}x{})",
                desc.width, desc.height
            )));
        }

        let format = texture_format_to_vk(desc.format);
        let (usage, aspect_mask) = if desc.format.is_depth() {
            (
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
                vk::ImageAspectFlags::DEPTH,
            )
        } else {
            (
                vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
                vk::ImageAspectFlags::COLOR,
            )
        };

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_create_info, None)
                .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create texture image: {:?}", e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = ctx
                .allocator
                .lock()
                .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))
                .and_then(|mut allocator| {
                    allocator
                        .allocate(&AllocationCreateDesc {
                            name: "texture",
                            requirements,
                            location: MemoryLocation::GpuOnly,
                            linear: false,
                            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                        })
                        .map_err(|_e| {
                            let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                            engine_error!(
                                ctx.console,
                                SOURCE,
                                "Out of GPU memory for texture ({}x{}, {:.2} MB)",
                                desc.width,
                                desc.height,
                                size_mb
                            );
                            Error::OutOfMemory
                        })
                });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            let mut texture = Self {
                ctx: ctx.clone(),
                image,
                view: vk::ImageView::null(),
                allocation: Some(allocation),
                desc: desc.clone(),
            };

            // From here on `texture`'s Drop releases whatever was created
            if let Some(allocation) = &texture.allocation {
                ctx.device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
                    .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to bind texture image memory: {:?}", e))?;
            }

            let view_create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(subresource_range(aspect_mask));

            texture.view = ctx
                .device
                .create_image_view(&view_create_info, None)
                .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create texture image view: {:?}", e))?;

            Ok(texture)
        }
    }

    pub(crate) fn aspect_mask(&self) -> vk::ImageAspectFlags {
        if self.desc.format.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        }
    }
}

/// The whole single-mip, single-layer image
pub(crate) fn subresource_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

impl RendererTexture for Texture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            self.ctx.device.destroy_image(self.image, None);
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
        }
    }
}
