/// Binding layout and pipeline state - Vulkan implementations
///
/// Each table of a `BindingLayoutDesc` becomes one descriptor set layout,
/// at set index = table index. Inside a set, binding N is table slot N
/// relative to the bound base slot, so shaders declare their resources as
/// `[[vk::binding(slot, table)]]` in table order (constant buffers, then
/// textures, then storage buffers; samplers in set 1).
///
/// Pipelines render through dynamic rendering into the surface format, so
/// they need no render pass object.

use ash::vk;
use spider_engine::spider::render::{
    BindingLayout as RendererBindingLayout, BindingLayoutDesc, PipelineState as RendererPipelineState,
    PipelineStateDesc, TableDesc,
};
use spider_engine::spider::{Error, Result};
use spider_engine::{engine_err, engine_warn};
use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::{
    buffer_format_to_vk, cull_mode_to_vk, range_kind_to_descriptor_type, shader_stage_to_vk,
    stage_mask_to_vk, texture_format_to_vk, topology_to_vk,
};

/// Set layout bindings of one table, one binding per slot
pub(crate) fn set_layout_bindings(table: &TableDesc) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    let stage_flags = stage_mask_to_vk(table.visibility);
    table
        .ranges
        .iter()
        .flat_map(|range| {
            (0..range.count).map(move |i| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(range.offset + i)
                    .descriptor_type(range_kind_to_descriptor_type(range.kind))
                    .descriptor_count(1)
                    .stage_flags(stage_flags)
            })
        })
        .collect()
}

// ============================================================================
// BINDING LAYOUT
// ============================================================================

pub struct BindingLayout {
    ctx: Arc<GpuContext>,
    desc: BindingLayoutDesc,
    pub(crate) set_layouts: Vec<vk::DescriptorSetLayout>,
    pub(crate) pipeline_layout: vk::PipelineLayout,
}

impl BindingLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BindingLayoutDesc) -> Result<Self> {
        let mut layout = Self {
            ctx: ctx.clone(),
            desc: desc.clone(),
            set_layouts: Vec::with_capacity(desc.tables.len()),
            pipeline_layout: vk::PipelineLayout::null(),
        };

        // Partially built layouts are released by Drop
        unsafe {
            for table in &desc.tables {
                let bindings = set_layout_bindings(table);
                let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
                let set_layout = ctx
                    .device
                    .create_descriptor_set_layout(&create_info, None)
                    .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create descriptor set layout: {:?}", e))?;
                layout.set_layouts.push(set_layout);
            }

            let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&layout.set_layouts);
            layout.pipeline_layout = ctx
                .device
                .create_pipeline_layout(&create_info, None)
                .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create pipeline layout: {:?}", e))?;
        }
        Ok(layout)
    }
}

impl RendererBindingLayout for BindingLayout {
    fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for BindingLayout {
    fn drop(&mut self) {
        unsafe {
            if self.pipeline_layout != vk::PipelineLayout::null() {
                self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            }
            for &set_layout in &self.set_layouts {
                self.ctx.device.destroy_descriptor_set_layout(set_layout, None);
            }
        }
    }
}

// ============================================================================
// PIPELINE STATE
// ============================================================================

pub struct PipelineState {
    ctx: Arc<GpuContext>,
    binding_layout: Arc<dyn RendererBindingLayout>,
    pub(crate) pipeline: vk::Pipeline,
}

impl PipelineState {
    /// Build a graphics pipeline rendering into `color_format`
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &PipelineStateDesc, color_format: vk::Format) -> Result<Self> {
        let layout = desc
            .binding_layout
            .as_any()
            .downcast_ref::<BindingLayout>()
            .ok_or_else(|| Error::InvalidResource("binding layout is not a Vulkan binding layout".to_string()))?;

        if texture_format_to_vk(desc.raster.color_format) != color_format {
            engine_warn!(
                ctx.console,
                SOURCE,
                "Pipeline color format {:?} differs from the surface format {:?}, using the surface format",
                desc.raster.color_format,
                color_format
            );
        }
        if desc.raster.depth_test {
            engine_warn!(ctx.console, SOURCE, "Surface pass has no depth attachment, depth test disabled");
        }

        let mut modules = Vec::with_capacity(desc.stages.len());
        let result = unsafe { Self::build(&ctx, desc, layout.pipeline_layout, color_format, &mut modules) };
        unsafe {
            for module in modules {
                ctx.device.destroy_shader_module(module, None);
            }
        }

        Ok(Self {
            pipeline: result?,
            binding_layout: desc.binding_layout.clone(),
            ctx,
        })
    }

    /// Shader modules created along the way are pushed to `modules` for the caller to destroy
    unsafe fn build(
        ctx: &GpuContext,
        desc: &PipelineStateDesc,
        pipeline_layout: vk::PipelineLayout,
        color_format: vk::Format,
        modules: &mut Vec<vk::ShaderModule>,
    ) -> Result<vk::Pipeline> {
        let mut entry_points = Vec::with_capacity(desc.stages.len());
        for stage in &desc.stages {
            let code = ash::util::read_spv(&mut std::io::Cursor::new(&stage.bytecode[..]))
                .map_err(|e| Error::ShaderCompilation(format!("{:?} stage is not valid SPIR-V: {}", stage.stage, e)))?;
            let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
            modules.push(
                ctx.device
                    .create_shader_module(&create_info, None)
                    .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create shader module: {:?}", e))?,
            );
            entry_points.push(CString::new(stage.entry_point.as_str()).map_err(|_| {
                Error::ShaderCompilation(format!("entry point '{}' contains a NUL byte", stage.entry_point))
            })?);
        }

        let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = desc
            .stages
            .iter()
            .zip(modules.iter())
            .zip(entry_points.iter())
            .map(|((stage, &module), entry_point)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_to_vk(stage.stage))
                    .module(module)
                    .name(entry_point)
            })
            .collect();

        // Vertex input state: one interleaved stream
        let vertex_bindings = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: desc.vertex_layout.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: 0,
                format: buffer_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.raster.topology))
            .primitive_restart_enable(false);

        // Viewport state (dynamic)
        let viewports = [vk::Viewport::default()];
        let scissors = [vk::Rect2D::default()];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        // The surface viewport is flipped (negative height), which keeps
        // clockwise triangles front-facing as seen on screen
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(desc.raster.cull_mode))
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(false)
            .depth_write_enable(false)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false);
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [color_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default().color_attachment_formats(&color_formats);

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .push_next(&mut rendering_info);

        let pipelines = ctx
            .device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
            .map_err(|e| engine_err!(ctx.console, SOURCE, "Failed to create graphics pipeline: {:?}", e.1))?;
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| Error::BackendError("driver returned no pipeline".to_string()))
    }
}

impl RendererPipelineState for PipelineState {
    fn binding_layout(&self) -> &Arc<dyn RendererBindingLayout> {
        &self.binding_layout
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for PipelineState {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}
