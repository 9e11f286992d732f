/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Contains everything resources need once they exist:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - The single queue, behind a mutex (submits come from the frame thread
///   and from upload contexts)
/// - The console backend messages are logged to

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use spider_engine::spider::log::Console;
use spider_engine::spider::{Error, Result};
use std::any::Any;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

#[cfg(feature = "vulkan-validation")]
use crate::debug::DebugMessenger;

pub(crate) const SOURCE: &str = "spider::vulkan";

/// Shared GPU context for all Vulkan resources.
///
/// Every buffer, texture, table and command list holds an `Arc<GpuContext>`,
/// so the context is dropped after the last of them. Its `Drop` tears the
/// allocator, device, debug messenger and instance down in that order.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is released BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics + present queue
    pub queue: Mutex<vk::Queue>,

    /// Queue family of `queue`
    pub queue_family: u32,

    pub physical_device: vk::PhysicalDevice,

    pub instance: ash::Instance,

    /// Whether sampler anisotropy was enabled on the device
    pub anisotropy: bool,

    pub console: Console,

    #[cfg(feature = "vulkan-validation")]
    pub(crate) debug: Option<DebugMessenger>,

    /// Keeps the Vulkan library loaded
    _entry: ash::Entry,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        queue: vk::Queue,
        queue_family: u32,
        anisotropy: bool,
        console: Console,
        #[cfg(feature = "vulkan-validation")] debug: Option<DebugMessenger>,
    ) -> Self {
        Self {
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            queue: Mutex::new(queue),
            queue_family,
            physical_device,
            instance,
            anisotropy,
            console,
            #[cfg(feature = "vulkan-validation")]
            debug,
            _entry: entry,
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Allocator frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);

            #[cfg(feature = "vulkan-validation")]
            if let Some(debug) = self.debug.take() {
                debug.destroy();
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// `DEVICE_LOST` ends the frame loop, anything else is a backend error
pub(crate) fn device_error(result: vk::Result, action: &str) -> Error {
    match result {
        vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost(format!("device lost during {}", action)),
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            Error::OutOfMemory
        }
        _ => Error::BackendError(format!("Failed to {}: {:?}", action, result)),
    }
}

/// Downcast a backend object handed back by the core
pub(crate) fn downcast<'a, T: 'static>(object: &'a dyn Any, what: &str) -> Result<&'a T> {
    object
        .downcast_ref::<T>()
        .ok_or_else(|| Error::InvalidResource(format!("{} was not created by the Vulkan device", what)))
}

/// Lock a device-level mutex, a poisoned lock is a backend error
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| Error::BackendError(format!("{} lock poisoned", what)))
}
