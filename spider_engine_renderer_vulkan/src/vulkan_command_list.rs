/// CommandList - Vulkan implementation of the CommandList trait
///
/// Owns its command pool and a growable set of descriptor pools. Binding a
/// descriptor table allocates a transient descriptor set from those pools
/// and fills it from the table window; the pools are reset with the list.

use ash::vk;
use spider_engine::engine_err;
use spider_engine::spider::render::{
    BindingLayout as RendererBindingLayout, Buffer as RendererBuffer,
    CommandList as RendererCommandList, DescriptorTable as RendererDescriptorTable, IndexFormat,
    PipelineState as RendererPipelineState, Texture as RendererTexture,
};
use spider_engine::spider::{Error, Result};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::{downcast, GpuContext, SOURCE};
use crate::vulkan_descriptor_table::{plan_table_writes, DescriptorTable, SlotContent};
use crate::vulkan_format::index_format_to_vk;
use crate::vulkan_pipeline::{BindingLayout, PipelineState};
use crate::vulkan_swapchain::AcquiredImage;
use crate::vulkan_texture::{subresource_range, Texture};

/// Sets per transient descriptor pool
const SETS_PER_POOL: u32 = 512;
/// Descriptors of each type per transient descriptor pool
const DESCRIPTORS_PER_POOL: u32 = 1024;

/// Vulkan command list implementation
pub struct CommandList {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    recording: bool,

    /// Transient descriptor pools, `current_pool` is the one allocated from
    descriptor_pools: Vec<vk::DescriptorPool>,
    current_pool: usize,

    /// Layout of the bound pipeline, tables are bound against it
    bound_layout: Option<Arc<dyn RendererBindingLayout>>,

    /// Surface image this recording renders to
    surface: Option<AcquiredImage>,
    in_surface_pass: bool,
}

impl CommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx
                .device
                .create_command_pool(&command_pool_create_info, None)
                .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create command pool: {:?}", e))?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = match ctx.device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(engine_err!(ctx.console, SOURCE, "Failed to allocate command buffer: {:?}", e));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer,
                recording: false,
                descriptor_pools: Vec::new(),
                current_pool: 0,
                bound_layout: None,
                surface: None,
                in_surface_pass: false,
            })
        }
    }

    pub(crate) fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Surface image recorded into, if any
    pub(crate) fn surface_image(&self) -> Option<AcquiredImage> {
        self.surface
    }

    fn ensure_recording(&self) -> Result<()> {
        if !self.recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }
        Ok(())
    }

    // ===== SURFACE PASS =====

    /// Transition the acquired image to a color attachment and start rendering to it
    pub(crate) fn begin_surface_pass(
        &mut self,
        acquired: AcquiredImage,
        image: vk::Image,
        view: vk::ImageView,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Result<()> {
        self.ensure_recording()?;
        if self.surface.is_some() {
            return Err(Error::BackendError("Surface pass already recorded in this command list".to_string()));
        }

        let device = &self.ctx.device;
        let cb = self.command_buffer;
        unsafe {
            let barrier = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(subresource_range(vk::ImageAspectFlags::COLOR))
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
            device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );

            let color_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue { float32: clear_color },
                });
            let render_area = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent };
            let rendering_info = vk::RenderingInfo::default()
                .render_area(render_area)
                .layer_count(1)
                .color_attachments(std::slice::from_ref(&color_attachment));
            device.cmd_begin_rendering(cb, &rendering_info);

            // Flipped viewport keeps +Y up in clip space
            let viewport = vk::Viewport {
                x: 0.0,
                y: extent.height as f32,
                width: extent.width as f32,
                height: -(extent.height as f32),
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cb, 0, &[viewport]);
            device.cmd_set_scissor(cb, 0, &[render_area]);
        }

        self.surface = Some(acquired);
        self.in_surface_pass = true;
        Ok(())
    }

    /// Stop rendering and transition the surface image for presentation
    pub(crate) fn end_surface_pass(&mut self, image: vk::Image) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_surface_pass {
            return Err(Error::BackendError("No surface pass open".to_string()));
        }

        unsafe {
            self.ctx.device.cmd_end_rendering(self.command_buffer);

            let barrier = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(subresource_range(vk::ImageAspectFlags::COLOR))
                .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                .dst_access_mask(vk::AccessFlags::empty());
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        self.in_surface_pass = false;
        Ok(())
    }

    // ===== DESCRIPTOR SETS =====

    fn create_descriptor_pool(&self) -> Result<vk::DescriptorPool> {
        let pool_sizes = [
            vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER, descriptor_count: DESCRIPTORS_PER_POOL },
            vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_BUFFER, descriptor_count: DESCRIPTORS_PER_POOL },
            vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLED_IMAGE, descriptor_count: DESCRIPTORS_PER_POOL },
            vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLER, descriptor_count: DESCRIPTORS_PER_POOL },
        ];
        let info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(SETS_PER_POOL);

        unsafe {
            self.ctx
                .device
                .create_descriptor_pool(&info, None)
                .map_err(|e| engine_err!(self.ctx.console, SOURCE, "Failed to create descriptor pool: {:?}", e))
        }
    }

    /// Allocate a set, moving on to the next pool (created on demand) when
    /// the current one is exhausted
    fn allocate_set(&mut self, set_layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let set_layouts = [set_layout];
        loop {
            let fresh = self.current_pool == self.descriptor_pools.len();
            if fresh {
                let pool = self.create_descriptor_pool()?;
                self.descriptor_pools.push(pool);
            }

            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(self.descriptor_pools[self.current_pool])
                .set_layouts(&set_layouts);
            match unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) } {
                Ok(sets) => return Ok(sets[0]),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) if !fresh => {
                    self.current_pool += 1;
                }
                Err(e) => {
                    return Err(engine_err!(self.ctx.console, SOURCE, "Failed to allocate descriptor set: {:?}", e))
                }
            }
        }
    }
}

impl RendererCommandList for CommandList {
    fn reset(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }

        unsafe {
            for &pool in &self.descriptor_pools {
                self.ctx
                    .device
                    .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
                    .map_err(|e| engine_err!(self.ctx.console, SOURCE, "Failed to reset descriptor pool: {:?}", e))?;
            }

            self.ctx
                .device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("Failed to reset command buffer: {:?}", e)))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))?;
        }

        self.current_pool = 0;
        self.bound_layout = None;
        self.surface = None;
        self.in_surface_pass = false;
        self.recording = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.ensure_recording()?;

        unsafe {
            // A list abandoned mid-frame still has to end as a valid recording
            if self.in_surface_pass {
                self.ctx.device.cmd_end_rendering(self.command_buffer);
                self.in_surface_pass = false;
            }
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))?;
        }
        self.recording = false;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn set_pipeline_state(&mut self, pipeline: &dyn RendererPipelineState) -> Result<()> {
        self.ensure_recording()?;
        let vk_pipeline = downcast::<PipelineState>(pipeline.as_any(), "pipeline state")?;

        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline,
            );
        }
        self.bound_layout = Some(pipeline.binding_layout().clone());
        Ok(())
    }

    fn set_descriptor_table(
        &mut self,
        table_index: u32,
        table: &dyn RendererDescriptorTable,
        base_slot: u32,
    ) -> Result<()> {
        self.ensure_recording()?;
        let binding_layout = self
            .bound_layout
            .clone()
            .ok_or_else(|| Error::BackendError("Descriptor table bound before a pipeline state".to_string()))?;
        let layout = downcast::<BindingLayout>(binding_layout.as_any(), "binding layout")?;
        let table_desc = layout.desc().tables.get(table_index as usize).ok_or_else(|| {
            Error::InvalidResource(format!(
                "binding layout has {} tables, table {} requested",
                layout.desc().tables.len(),
                table_index
            ))
        })?;
        let set_layout = layout.set_layouts[table_index as usize];

        let vk_table = downcast::<DescriptorTable>(table.as_any(), "descriptor table")?;
        let window = vk_table.snapshot(base_slot, table_desc.slot_count())?;
        let planned = plan_table_writes(table_desc, &window)?;

        let set = self.allocate_set(set_layout)?;

        let buffer_infos: Vec<vk::DescriptorBufferInfo> = planned
            .iter()
            .map(|write| match write.content {
                SlotContent::UniformBuffer { buffer, range } | SlotContent::StorageBuffer { buffer, range } => {
                    vk::DescriptorBufferInfo { buffer, offset: 0, range }
                }
                _ => vk::DescriptorBufferInfo::default(),
            })
            .collect();
        let image_infos: Vec<vk::DescriptorImageInfo> = planned
            .iter()
            .map(|write| match write.content {
                SlotContent::SampledImage { view } => vk::DescriptorImageInfo {
                    sampler: vk::Sampler::null(),
                    image_view: view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
                SlotContent::Sampler { sampler } => vk::DescriptorImageInfo {
                    sampler,
                    image_view: vk::ImageView::null(),
                    image_layout: vk::ImageLayout::UNDEFINED,
                },
                _ => vk::DescriptorImageInfo::default(),
            })
            .collect();

        let writes: Vec<vk::WriteDescriptorSet> = planned
            .iter()
            .enumerate()
            .map(|(i, write)| {
                let vk_write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(write.binding)
                    .descriptor_type(write.descriptor_type);
                match write.content {
                    SlotContent::UniformBuffer { .. } | SlotContent::StorageBuffer { .. } => {
                        vk_write.buffer_info(std::slice::from_ref(&buffer_infos[i]))
                    }
                    _ => vk_write.image_info(std::slice::from_ref(&image_infos[i])),
                }
            })
            .collect();

        unsafe {
            self.ctx.device.update_descriptor_sets(&writes, &[]);
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout.pipeline_layout,
                table_index,
                &[set],
                &[],
            );
        }
        Ok(())
    }

    // Stride is part of the pipeline vertex layout in Vulkan
    fn set_vertex_buffer(&mut self, buffer: &dyn RendererBuffer, _stride: u32) -> Result<()> {
        self.ensure_recording()?;
        let vk_buffer = downcast::<Buffer>(buffer.as_any(), "vertex buffer")?;

        unsafe {
            self.ctx
                .device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[vk_buffer.buffer], &[0]);
        }
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: &dyn RendererBuffer, format: IndexFormat) -> Result<()> {
        self.ensure_recording()?;
        let vk_buffer = downcast::<Buffer>(buffer.as_any(), "index buffer")?;

        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer.buffer,
                0,
                index_format_to_vk(format),
            );
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32) -> Result<()> {
        self.ensure_recording()?;

        unsafe {
            self.ctx
                .device
                .cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, base_vertex, 0);
        }
        Ok(())
    }

    fn copy_buffer_to_texture(&mut self, src: &dyn RendererBuffer, dst: &dyn RendererTexture) -> Result<()> {
        self.ensure_recording()?;
        let vk_buffer = downcast::<Buffer>(src.as_any(), "upload buffer")?;
        let vk_texture = downcast::<Texture>(dst.as_any(), "texture")?;

        let desc = dst.desc();
        if desc.format.is_depth() {
            return Err(Error::InvalidResource("depth textures cannot be uploaded to".to_string()));
        }
        if src.size() < desc.byte_size() {
            return Err(Error::InvalidResource(format!(
                "upload buffer of {} bytes is smaller than the {} byte texture",
                src.size(),
                desc.byte_size()
            )));
        }

        let range = subresource_range(vk_texture.aspect_mask());
        let device = &self.ctx.device;
        let cb = self.command_buffer;
        unsafe {
            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(vk_texture.image)
                .subresource_range(range)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: range.aspect_mask,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                image_extent: vk::Extent3D { width: desc.width, height: desc.height, depth: 1 },
            };
            device.cmd_copy_buffer_to_image(
                cb,
                vk_buffer.buffer,
                vk_texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            let to_shader = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(vk_texture.image)
                .subresource_range(range)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);
            device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            for &pool in &self.descriptor_pools {
                self.ctx.device.destroy_descriptor_pool(pool, None);
            }
            // Frees the command buffer as well
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
