/// Fence - timeline semaphore implementation of the Fence trait
///
/// The GPU advances the counter through `VulkanDevice::signal`; the host
/// reads and waits on it directly.

use ash::vk;
use spider_engine::engine_err;
use spider_engine::spider::render::Fence as RendererFence;
use spider_engine::spider::Result;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{device_error, GpuContext, SOURCE};

pub struct Fence {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl Fence {
    pub(crate) fn new(ctx: Arc<GpuContext>, initial_value: u64) -> Result<Self> {
        let mut timeline_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_info);

        let semaphore = unsafe {
            ctx.device
                .create_semaphore(&create_info, None)
                .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create timeline semaphore: {:?}", e))?
        };
        Ok(Self { ctx, semaphore })
    }
}

impl RendererFence for Fence {
    fn completed_value(&self) -> Result<u64> {
        unsafe {
            self.ctx
                .device
                .get_semaphore_counter_value(self.semaphore)
                .map_err(|e| device_error(e, "read timeline semaphore"))
        }
    }

    fn wait_for(&self, value: u64) -> Result<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        unsafe {
            self.ctx
                .device
                .wait_semaphores(&wait_info, u64::MAX)
                .map_err(|e| device_error(e, "wait on timeline semaphore"))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
