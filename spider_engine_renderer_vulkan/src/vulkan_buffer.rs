/// Buffer - Vulkan implementation of the Buffer trait
///
/// Every buffer lives in host-visible memory (`CpuToGpu`) and stays mapped
/// for its whole life, so `update` is a plain copy.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use spider_engine::spider::render::{
    check_buffer_range, Buffer as RendererBuffer, BufferDesc, BufferUsage,
};
use spider_engine::spider::{Error, Result};
use spider_engine::{engine_err, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::buffer_usage_to_vk;

/// Vulkan buffer implementation
pub struct Buffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    usage: BufferUsage,
}

impl Buffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("buffer size must be non-zero".to_string()));
        }

        unsafe {
            let buffer_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&buffer_info, None)
                .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create buffer: {:?}", e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = ctx
                .allocator
                .lock()
                .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))
                .and_then(|mut allocator| {
                    allocator
                        .allocate(&AllocationCreateDesc {
                            name: "buffer",
                            requirements,
                            location: MemoryLocation::CpuToGpu,
                            linear: true,
                            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                        })
                        .map_err(|e| {
                            engine_error!(ctx.console, SOURCE, "Failed to allocate buffer memory: {:?}", e);
                            Error::OutOfMemory
                        })
                });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                ctx.device.destroy_buffer(buffer, None);
                if let Ok(mut allocator) = ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
                return Err(engine_err!(ctx.console, SOURCE, "Failed to bind buffer memory: {:?}", e));
            }

            Ok(Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                size: desc.size,
                usage: desc.usage,
            })
        }
    }
}

impl RendererBuffer for Buffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_buffer_range(self.size, offset, data)?;

        let mapped_ptr = self
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
