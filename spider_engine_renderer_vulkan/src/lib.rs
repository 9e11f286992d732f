/*!
# Spider Engine - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` trait of `spider_engine`,
built on ash for the Vulkan bindings and gpu-allocator for memory.

Shaders are consumed as precompiled SPIR-V; `VulkanDevice::shader_tools()`
returns the matching compiler and spirq-based reflector.

```no_run
use std::sync::Arc;
use spider_engine::spider::{Renderer, RendererConfig};
use spider_engine::spider::log::Console;
use spider_engine_renderer_vulkan::VulkanDevice;
# fn run(window: Arc<winit::window::Window>) -> spider_engine::spider::Result<()> {

let config = RendererConfig::default();
let console = Console::new();
let device = VulkanDevice::new(window, &config, console.clone())?;
let mut renderer = Renderer::new(Arc::new(device), VulkanDevice::shader_tools(), console, config)?;
# Ok(())
# }
```

The `vulkan-validation` feature enables the Khronos validation layer and
routes its messages to the renderer console.
*/

mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_sampler;
mod vulkan_descriptor_table;
mod vulkan_fence;
mod vulkan_pipeline;
mod vulkan_command_list;
mod vulkan_swapchain;
mod vulkan_shader;
mod vulkan_device;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan_device::VulkanDevice;
pub use vulkan_shader::{SpirqReflector, SpirvCompiler};

#[cfg(feature = "vulkan-validation")]
pub use debug::ValidationStats;
