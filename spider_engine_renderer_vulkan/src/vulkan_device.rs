/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait
///
/// One instance, one logical device, one graphics queue that also presents,
/// and one window surface. Requires Vulkan 1.3 (dynamic rendering) with
/// timeline semaphores.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use spider_engine::spider::log::Console;
use spider_engine::spider::pipeline::ShaderTools;
use spider_engine::spider::render::{
    BindingLayout as RendererBindingLayout, BindingLayoutDesc, Buffer as RendererBuffer, BufferDesc,
    CommandList as RendererCommandList, DescriptorCategory, DescriptorTable as RendererDescriptorTable,
    DescriptorWrite, Fence as RendererFence, GraphicsDevice, PipelineState as RendererPipelineState,
    PipelineStateDesc, Texture as RendererTexture, TextureDesc,
};
use spider_engine::spider::{Error, RendererConfig, Result};
use spider_engine::{engine_debug, engine_error, engine_info, engine_warn};
use std::ffi::CString;
use std::sync::{Arc, Mutex};
use winit::window::{Fullscreen, Window};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::{device_error, downcast, lock, GpuContext, SOURCE};
use crate::vulkan_descriptor_table::{DescriptorTable, SlotContent};
use crate::vulkan_fence::Fence;
use crate::vulkan_pipeline::{BindingLayout, PipelineState};
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_shader::{SpirqReflector, SpirvCompiler};
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_texture::Texture;

#[cfg(feature = "vulkan-validation")]
use crate::debug::{DebugMessenger, ValidationStats};

/// First queue family that does graphics and can present to the surface
pub(crate) fn select_queue_family(
    families: &[vk::QueueFamilyProperties],
    can_present: impl Fn(u32) -> bool,
) -> Option<u32> {
    families
        .iter()
        .enumerate()
        .filter(|(_, family)| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|(index, _)| index as u32)
        .find(|&index| can_present(index))
}

fn init_error(console: &Console, message: String) -> Error {
    engine_error!(console, SOURCE, "{}", message);
    Error::InitializationFailed(message)
}

/// Vulkan graphics device
pub struct VulkanDevice {
    ctx: Arc<GpuContext>,
    window: Arc<Window>,
    adapter_name: String,
    swapchain: Mutex<Swapchain>,
    samplers: Mutex<SamplerCache>,
    /// Surface image rendered by the last submit, presented next
    pending_present: Mutex<Option<u32>>,
}

impl VulkanDevice {
    /// Open the adapter `config.device_index` and build a swapchain for `window`
    pub fn new(window: Arc<Window>, config: &RendererConfig, console: Console) -> Result<Self> {
        let validation = cfg!(feature = "vulkan-validation") && config.enable_validation;
        if config.enable_validation && !validation {
            engine_warn!(
                console,
                SOURCE,
                "Validation requested but the vulkan-validation feature is disabled"
            );
        }

        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_error(&console, format!("Failed to load Vulkan library: {:?}", e)))?;

            // ===== INSTANCE =====

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|_| Error::InitializationFailed("app_name contains a NUL byte".to_string()))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Spider")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window
                .display_handle()
                .map_err(|e| init_error(&console, format!("Failed to get display handle: {}", e)))?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_error(&console, format!("Failed to get required extensions: {}", e)))?
                .to_vec();

            let mut layer_names = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error(&console, format!("Failed to create Vulkan instance: {:?}", e)))?;

            #[cfg(feature = "vulkan-validation")]
            let debug = if validation {
                Some(DebugMessenger::new(&entry, &instance, console.clone())?)
            } else {
                None
            };

            // ===== SURFACE =====

            let window_handle = window
                .window_handle()
                .map_err(|e| init_error(&console, format!("Failed to get window handle: {}", e)))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_error(&console, format!("Failed to create surface: {:?}", e)))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            // ===== PHYSICAL DEVICE =====

            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| init_error(&console, format!("Failed to enumerate physical devices: {:?}", e)))?;
            let physical_device = *physical_devices.get(config.device_index as usize).ok_or_else(|| {
                init_error(
                    &console,
                    format!(
                        "Adapter {} requested but {} Vulkan adapter(s) found",
                        config.device_index,
                        physical_devices.len()
                    ),
                )
            })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let adapter_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown adapter".to_string());
            if properties.api_version < vk::API_VERSION_1_3 {
                return Err(init_error(
                    &console,
                    format!(
                        "{} supports Vulkan {}.{}, 1.3 is required",
                        adapter_name,
                        vk::api_version_major(properties.api_version),
                        vk::api_version_minor(properties.api_version)
                    ),
                ));
            }

            let mut supported12 = vk::PhysicalDeviceVulkan12Features::default();
            let mut supported13 = vk::PhysicalDeviceVulkan13Features::default();
            let mut supported = vk::PhysicalDeviceFeatures2::default()
                .push_next(&mut supported12)
                .push_next(&mut supported13);
            instance.get_physical_device_features2(physical_device, &mut supported);
            let anisotropy = supported.features.sampler_anisotropy == vk::TRUE;
            if supported12.timeline_semaphore != vk::TRUE || supported13.dynamic_rendering != vk::TRUE {
                return Err(init_error(
                    &console,
                    format!("{} lacks timeline semaphores or dynamic rendering", adapter_name),
                ));
            }

            let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
            let queue_family = select_queue_family(&queue_families, |index| {
                surface_loader
                    .get_physical_device_surface_support(physical_device, index, surface)
                    .unwrap_or(false)
            })
            .ok_or_else(|| init_error(&console, "No queue family can both render and present".to_string()))?;

            // ===== LOGICAL DEVICE =====

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)];

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(anisotropy);
            let mut features12 = vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
            let mut features13 = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features)
                .push_next(&mut features12)
                .push_next(&mut features13);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_error(&console, format!("Failed to create logical device: {:?}", e)))?;
            let queue = device.get_device_queue(queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_error(&console, format!("Failed to create GPU allocator: {:?}", e)))?;

            let ctx = Arc::new(GpuContext::new(
                entry,
                instance,
                physical_device,
                device,
                allocator,
                queue,
                queue_family,
                anisotropy,
                console.clone(),
                #[cfg(feature = "vulkan-validation")]
                debug,
            ));

            // ===== SWAPCHAIN =====

            let size = window.inner_size();
            let swapchain = Swapchain::new(
                ctx.clone(),
                surface,
                surface_loader,
                size.width,
                size.height,
                config.vsync,
            )?;

            engine_info!(
                console,
                SOURCE,
                "Vulkan device ready: {} (Vulkan {}.{}.{}), queue family {}",
                adapter_name,
                vk::api_version_major(properties.api_version),
                vk::api_version_minor(properties.api_version),
                vk::api_version_patch(properties.api_version),
                queue_family
            );

            Ok(Self {
                samplers: Mutex::new(SamplerCache::new(ctx.clone())),
                swapchain: Mutex::new(swapchain),
                pending_present: Mutex::new(None),
                adapter_name,
                window,
                ctx,
            })
        }
    }

    /// SPIR-V compiler and reflector matching this backend
    pub fn shader_tools() -> ShaderTools {
        ShaderTools {
            compiler: Arc::new(SpirvCompiler),
            reflector: Arc::new(SpirqReflector),
        }
    }

    /// Name of the opened adapter
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Validation message counts, `None` when validation is off
    #[cfg(feature = "vulkan-validation")]
    pub fn validation_stats(&self) -> Option<ValidationStats> {
        self.ctx.debug.as_ref().map(|debug| debug.stats())
    }

    /// Print the validation summary to stdout
    #[cfg(feature = "vulkan-validation")]
    pub fn print_validation_report(&self) {
        if let Some(debug) = self.ctx.debug.as_ref() {
            debug.print_report();
        }
    }

    fn command_list_mut(command_list: &mut dyn RendererCommandList) -> Result<&mut CommandList> {
        command_list
            .as_any_mut()
            .downcast_mut::<CommandList>()
            .ok_or_else(|| Error::InvalidResource("command list was not created by the Vulkan device".to_string()))
    }

    fn slot_content(&self, write: &DescriptorWrite<'_>) -> Result<SlotContent> {
        Ok(match *write {
            DescriptorWrite::Null => SlotContent::Empty,
            DescriptorWrite::ConstantBuffer { buffer } => SlotContent::UniformBuffer {
                buffer: downcast::<Buffer>(buffer.as_any(), "constant buffer")?.buffer,
                range: buffer.size(),
            },
            DescriptorWrite::StructuredBuffer { buffer, stride, element_count } => {
                let viewed = stride as u64 * element_count as u64;
                SlotContent::StorageBuffer {
                    buffer: downcast::<Buffer>(buffer.as_any(), "structured buffer")?.buffer,
                    range: if viewed == 0 { buffer.size() } else { viewed.min(buffer.size()) },
                }
            }
            DescriptorWrite::RawBuffer { buffer } => SlotContent::StorageBuffer {
                buffer: downcast::<Buffer>(buffer.as_any(), "raw buffer")?.buffer,
                range: buffer.size(),
            },
            DescriptorWrite::Texture { texture } => SlotContent::SampledImage {
                view: downcast::<Texture>(texture.as_any(), "texture")?.view,
            },
            DescriptorWrite::Sampler(desc) => SlotContent::Sampler {
                sampler: lock(&self.samplers, "sampler cache")?.get(desc)?,
            },
        })
    }
}

impl GraphicsDevice for VulkanDevice {
    // ===== DESCRIPTORS =====

    fn create_descriptor_table(
        &self,
        category: DescriptorCategory,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<Arc<dyn RendererDescriptorTable>> {
        engine_debug!(self.ctx.console, SOURCE, "Descriptor table: {:?}, {} slots", category, capacity);
        Ok(Arc::new(DescriptorTable::new(category, capacity, shader_visible)))
    }

    fn copy_descriptors(
        &self,
        src: &dyn RendererDescriptorTable,
        dst: &dyn RendererDescriptorTable,
        count: u32,
    ) -> Result<()> {
        let src = downcast::<DescriptorTable>(src.as_any(), "descriptor table")?;
        let dst = downcast::<DescriptorTable>(dst.as_any(), "descriptor table")?;
        dst.copy_from(src, count)
    }

    fn write_descriptor(
        &self,
        table: &dyn RendererDescriptorTable,
        slot: u32,
        write: &DescriptorWrite<'_>,
    ) -> Result<()> {
        if let Some(category) = write.category() {
            if category != table.category() {
                return Err(Error::InvalidResource(format!(
                    "{} written into a {:?} table",
                    write.kind_name(),
                    table.category()
                )));
            }
        }
        let vk_table = downcast::<DescriptorTable>(table.as_any(), "descriptor table")?;
        vk_table.write(slot, self.slot_content(write)?)
    }

    // ===== RESOURCES =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn RendererBuffer>> {
        Ok(Arc::new(Buffer::new(self.ctx.clone(), desc)?))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn RendererTexture>> {
        Ok(Arc::new(Texture::new(self.ctx.clone(), desc)?))
    }

    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn RendererBindingLayout>> {
        Ok(Arc::new(BindingLayout::new(self.ctx.clone(), desc)?))
    }

    fn create_pipeline_state(&self, desc: &PipelineStateDesc) -> Result<Arc<dyn RendererPipelineState>> {
        let color_format = lock(&self.swapchain, "swapchain")?.format();
        Ok(Arc::new(PipelineState::new(self.ctx.clone(), desc, color_format)?))
    }

    // ===== SUBMISSION =====

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn RendererFence>> {
        Ok(Arc::new(Fence::new(self.ctx.clone(), initial_value)?))
    }

    fn create_command_list(&self) -> Result<Box<dyn RendererCommandList>> {
        Ok(Box::new(CommandList::new(self.ctx.clone())?))
    }

    fn submit(&self, command_list: &dyn RendererCommandList) -> Result<()> {
        if command_list.is_recording() {
            return Err(Error::BackendError("Submitting an open command list".to_string()));
        }
        let list = downcast::<CommandList>(command_list.as_any(), "command list")?;

        let command_buffers = [list.command_buffer()];
        let mut wait_semaphores = Vec::new();
        let mut signal_semaphores = Vec::new();
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];

        let swapchain = lock(&self.swapchain, "swapchain")?;
        let surface = list.surface_image();
        if let Some(acquired) = surface {
            // Render after the image is released by the presentation engine,
            // present after rendering
            wait_semaphores.push(acquired.ready);
            signal_semaphores.push(swapchain.render_finished(acquired.index));
        }

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages[..wait_semaphores.len()])
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let queue = lock(&self.ctx.queue, "queue")?;
        unsafe {
            self.ctx
                .device
                .queue_submit(*queue, &[submit_info], vk::Fence::null())
                .map_err(|e| device_error(e, "submit command list"))?;
        }

        if let Some(acquired) = surface {
            *lock(&self.pending_present, "present state")? = Some(acquired.index);
        }
        Ok(())
    }

    fn signal(&self, fence: &dyn RendererFence, value: u64) -> Result<()> {
        let vk_fence = downcast::<Fence>(fence.as_any(), "fence")?;

        let signal_semaphores = [vk_fence.semaphore];
        let signal_values = [value];
        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        let queue = lock(&self.ctx.queue, "queue")?;
        unsafe {
            self.ctx
                .device
                .queue_submit(*queue, &[submit_info], vk::Fence::null())
                .map_err(|e| device_error(e, "signal fence"))
        }
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| device_error(e, "wait for device idle"))
        }
    }

    // ===== SURFACE =====

    fn begin_surface_pass(
        &self,
        command_list: &mut dyn RendererCommandList,
        clear_color: [f32; 4],
    ) -> Result<()> {
        let list = Self::command_list_mut(command_list)?;
        let mut swapchain = lock(&self.swapchain, "swapchain")?;

        let acquired = match swapchain.acquire()? {
            Some(acquired) => acquired,
            None => {
                engine_debug!(self.ctx.console, SOURCE, "Surface out of date on acquire, recreating");
                let size = self.window.inner_size();
                let present_mode = swapchain.present_mode();
                swapchain.recreate(size.width, size.height, present_mode)?;
                swapchain.acquire()?.ok_or_else(|| {
                    Error::BackendError("Surface still out of date after recreation".to_string())
                })?
            }
        };

        list.begin_surface_pass(
            acquired,
            swapchain.image(acquired.index),
            swapchain.view(acquired.index),
            swapchain.extent(),
            clear_color,
        )
    }

    fn end_surface_pass(&self, command_list: &mut dyn RendererCommandList) -> Result<()> {
        let list = Self::command_list_mut(command_list)?;
        let acquired = list
            .surface_image()
            .ok_or_else(|| Error::BackendError("No surface pass open".to_string()))?;
        let image = lock(&self.swapchain, "swapchain")?.image(acquired.index);
        list.end_surface_pass(image)
    }

    fn present(&self, vsync: bool) -> Result<()> {
        let index = lock(&self.pending_present, "present state")?
            .take()
            .ok_or_else(|| Error::FrameOrder("no rendered surface image to present".to_string()))?;

        let mut swapchain = lock(&self.swapchain, "swapchain")?;
        let out_of_date = {
            let queue = lock(&self.ctx.queue, "queue")?;
            swapchain.present(*queue, index)?
        };

        let present_mode = swapchain.present_mode_for(vsync)?;
        if out_of_date || present_mode != swapchain.present_mode() {
            engine_debug!(
                self.ctx.console,
                SOURCE,
                "Recreating swapchain (out of date: {}, present mode {:?})",
                out_of_date,
                present_mode
            );
            let size = self.window.inner_size();
            swapchain.recreate(size.width, size.height, present_mode)?;
        }
        Ok(())
    }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        let mut swapchain = lock(&self.swapchain, "swapchain")?;
        let present_mode = swapchain.present_mode();
        swapchain.recreate(width, height, present_mode)
    }

    fn set_fullscreen(&self, fullscreen: bool) -> Result<()> {
        self.window
            .set_fullscreen(fullscreen.then_some(Fullscreen::Borderless(None)));
        Ok(())
    }

    fn surface_extent(&self) -> (u32, u32) {
        self.swapchain
            .lock()
            .map(|swapchain| {
                let extent = swapchain.extent();
                (extent.width, extent.height)
            })
            .unwrap_or((0, 0))
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }
        #[cfg(feature = "vulkan-validation")]
        if let Some(stats) = self.validation_stats() {
            if stats.total() > 0 {
                engine_info!(
                    self.ctx.console,
                    SOURCE,
                    "Validation messages: {} error(s), {} warning(s)",
                    stats.errors,
                    stats.warnings
                );
            }
        }
    }
}
