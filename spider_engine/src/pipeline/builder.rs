/// PipelineLayoutBuilder - turns shader descriptions into a bound RenderPipeline
///
/// A build compiles and reflects every stage, sizes one resource-view range
/// and one sampler range from the aggregated reflection, creates the binding
/// layout and pipeline state, and then materializes one backing resource per
/// declared binding. Any failure aborts the whole build.

use std::sync::Arc;

use crate::descriptor::{ArenaAllocator, ArenaId, SlotRange, SlotRef};
use crate::error::{Error, Result};
use crate::graphics_device::{
    DescriptorWrite, GraphicsDevice, PipelineStateDesc, RangeKind, RasterState, SamplerDesc,
    StageBytecode, VertexLayout,
};
use crate::log::Console;
use crate::scene::Vertex;
use crate::shader::{
    ReflectionResult, RegisterConvention, ResourceViewKind, ShaderCompiler, ShaderDesc, ShaderModule,
    ShaderReflector, ShaderStage, StageMask,
};
use crate::{engine_debug, engine_error, engine_info, engine_warn};
use super::binding::{BindingResource, BindingSlot};
use super::layout::{PipelineLayout, RangeCounts};
use super::registry::{view_size, BindingRegistry};
use super::render_pipeline::RenderPipeline;
use super::resource_factory::ResourceFactory;

const SOURCE: &str = "spider::pipeline";

/// Fixed-function choices of a pipeline
#[derive(Debug, Clone)]
pub struct PipelinePolicy {
    pub vertex_layout: VertexLayout,
    pub raster: RasterState,
    /// Written into every sampler slot the shaders declare
    pub default_sampler: SamplerDesc,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            vertex_layout: Vertex::layout(),
            raster: RasterState::default(),
            default_sampler: SamplerDesc::default(),
        }
    }
}

/// Compiler and reflector of one shading language
#[derive(Clone)]
pub struct ShaderTools {
    pub compiler: Arc<dyn ShaderCompiler>,
    pub reflector: Arc<dyn ShaderReflector>,
}

/// Hands out table indices inside one range
///
/// A binding gets its register hint when that index is inside the range and
/// still free, otherwise the lowest free index. Hints are relative to the
/// start of the range, see `register_hint`.
struct IndexAssigner {
    kind: RangeKind,
    taken: Vec<bool>,
}

impl IndexAssigner {
    fn new(kind: RangeKind, counts: &RangeCounts) -> Self {
        Self {
            kind,
            taken: vec![false; counts.range_count(kind) as usize],
        }
    }

    fn assign(&mut self, register: Option<u32>) -> Result<u32> {
        if let Some(register) = register {
            if let Some(taken) = self.taken.get_mut(register as usize) {
                if !*taken {
                    *taken = true;
                    return Ok(register);
                }
            }
        }
        let free = self.taken.iter().position(|taken| !taken).ok_or_else(|| {
            Error::InvalidResource(format!("{:?} range has no free index left", self.kind))
        })?;
        self.taken[free] = true;
        Ok(free as u32)
    }
}

fn view_range_kind(kind: ResourceViewKind) -> RangeKind {
    match kind {
        ResourceViewKind::Texture => RangeKind::Texture,
        ResourceViewKind::Structured | ResourceViewKind::ByteAddress => RangeKind::StorageBuffer,
    }
}

/// Register of `name` as an index inside its kind's range
///
/// Table-slot registers sit before the range for bindings the shader placed
/// elsewhere; those get no hint.
fn register_hint(
    reflection: &ReflectionResult,
    name: &str,
    convention: RegisterConvention,
    range_offset: u32,
) -> Option<u32> {
    let register = reflection.binding_point(name)?.register;
    match convention {
        RegisterConvention::PerKind => Some(register),
        RegisterConvention::TableSlot => register.checked_sub(range_offset),
    }
}

fn slot_at(range: Option<SlotRange>, offset: u32) -> Result<SlotRef> {
    range
        .and_then(|range| range.slot(offset))
        .ok_or_else(|| Error::InvalidResource(format!("table offset {} outside the reserved range", offset)))
}

pub struct PipelineLayoutBuilder {
    device: Arc<dyn GraphicsDevice>,
    allocator: Arc<ArenaAllocator>,
    factory: Arc<dyn ResourceFactory>,
    tools: ShaderTools,
    console: Console,
    view_arena: ArenaId,
    sampler_arena: ArenaId,
}

impl PipelineLayoutBuilder {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        allocator: Arc<ArenaAllocator>,
        factory: Arc<dyn ResourceFactory>,
        tools: ShaderTools,
        console: Console,
        view_arena: ArenaId,
        sampler_arena: ArenaId,
    ) -> Self {
        Self {
            device,
            allocator,
            factory,
            tools,
            console,
            view_arena,
            sampler_arena,
        }
    }

    /// Build a pipeline from one description per stage
    pub fn build(&self, shaders: &[ShaderDesc], policy: &PipelinePolicy) -> Result<RenderPipeline> {
        self.try_build(shaders, policy).inspect_err(|e| {
            engine_error!(self.console, SOURCE, "Pipeline build failed: {}", e);
        })
    }

    fn try_build(&self, shaders: &[ShaderDesc], policy: &PipelinePolicy) -> Result<RenderPipeline> {
        let compiled = self.compile_modules(shaders)?;
        let counts = Self::aggregate(&compiled);

        let layout = self.create_layout(&compiled, &counts, policy)?;

        let view_table = self.reserve(self.view_arena, counts.view_slots())?;
        let sampler_table = self.reserve(self.sampler_arena, counts.samplers)?;

        let registry = self.materialize(&compiled, &counts, view_table, sampler_table, policy)?;

        engine_info!(
            self.console,
            SOURCE,
            "Built pipeline with {} stage(s): {} constant buffer(s), {} texture(s), {} storage buffer(s), {} sampler(s)",
            compiled.len(),
            counts.constant_buffers,
            counts.textures,
            counts.storage_buffers,
            counts.samplers
        );

        let modules = compiled.into_iter().map(|(module, _)| module).collect();
        Ok(RenderPipeline::new(modules, layout, registry, view_table, sampler_table))
    }

    /// Compile and reflect every description, one per stage
    fn compile_modules<'a>(&self, shaders: &'a [ShaderDesc]) -> Result<Vec<(ShaderModule, &'a ShaderDesc)>> {
        let mut compiled: Vec<(ShaderModule, &ShaderDesc)> = Vec::with_capacity(shaders.len());

        for desc in shaders {
            let stage = ShaderStage::try_from(desc.visibility)?;
            if compiled.iter().any(|(module, _)| module.stage() == stage) {
                return Err(Error::InvalidStage(format!("{:?} stage described twice", stage)));
            }
            let module = ShaderModule::compile(
                desc,
                stage,
                self.tools.compiler.as_ref(),
                self.tools.reflector.as_ref(),
            )?;
            if desc.views.len() > module.reflection().resource_views.len() {
                engine_warn!(
                    self.console,
                    SOURCE,
                    "{:?} shader got {} view source(s) but declares {} view(s); extra sources ignored",
                    stage,
                    desc.views.len(),
                    module.reflection().resource_views.len()
                );
            }
            compiled.push((module, desc));
        }

        if !compiled.iter().any(|(module, _)| module.stage() == ShaderStage::Vertex) {
            return Err(Error::InvalidStage("pipeline has no vertex shader".to_string()));
        }
        Ok(compiled)
    }

    fn aggregate(compiled: &[(ShaderModule, &ShaderDesc)]) -> RangeCounts {
        let mut counts = RangeCounts::default();
        for (module, _) in compiled {
            let reflection = module.reflection();
            counts.constant_buffers += reflection.constant_buffers.len() as u32;
            for view in &reflection.resource_views {
                match view_range_kind(view.kind) {
                    RangeKind::Texture => counts.textures += 1,
                    _ => counts.storage_buffers += 1,
                }
            }
            counts.samplers += reflection.samplers.len() as u32;
        }
        counts
    }

    fn create_layout(
        &self,
        compiled: &[(ShaderModule, &ShaderDesc)],
        counts: &RangeCounts,
        policy: &PipelinePolicy,
    ) -> Result<PipelineLayout> {
        let view_stages = StageMask::from_stages(
            compiled
                .iter()
                .filter(|(module, _)| module.reflection().view_slot_count() > 0)
                .map(|(module, _)| module.stage()),
        );
        let sampler_stages = StageMask::from_stages(
            compiled
                .iter()
                .filter(|(module, _)| module.reflection().sampler_slot_count() > 0)
                .map(|(module, _)| module.stage()),
        );

        let binding_layout = self
            .device
            .create_binding_layout(&counts.binding_layout_desc(view_stages, sampler_stages))?;

        let pipeline_state = self.device.create_pipeline_state(&PipelineStateDesc {
            stages: compiled
                .iter()
                .map(|(module, _)| StageBytecode {
                    stage: module.stage(),
                    bytecode: module.bytecode().clone(),
                    entry_point: module.entry_point().to_string(),
                })
                .collect(),
            binding_layout: binding_layout.clone(),
            vertex_layout: policy.vertex_layout.clone(),
            raster: policy.raster.clone(),
        })?;

        Ok(PipelineLayout::new(*counts, binding_layout, pipeline_state))
    }

    fn reserve(&self, arena: ArenaId, count: u32) -> Result<Option<SlotRange>> {
        if count == 0 {
            return Ok(None);
        }
        self.allocator
            .allocate_with(arena, count, &DescriptorWrite::Null)
            .map(Some)
    }

    fn materialize(
        &self,
        compiled: &[(ShaderModule, &ShaderDesc)],
        counts: &RangeCounts,
        view_table: Option<SlotRange>,
        sampler_table: Option<SlotRange>,
        policy: &PipelinePolicy,
    ) -> Result<BindingRegistry> {
        let mut constant_buffers = IndexAssigner::new(RangeKind::ConstantBuffer, counts);
        let mut textures = IndexAssigner::new(RangeKind::Texture, counts);
        let mut storage_buffers = IndexAssigner::new(RangeKind::StorageBuffer, counts);
        let mut samplers = IndexAssigner::new(RangeKind::Sampler, counts);
        let mut registry = BindingRegistry::new();
        let convention = self.tools.reflector.register_convention();

        for (module, desc) in compiled {
            let stage = module.stage();
            let reflection = module.reflection();
            let hint = |name: &str, range: RangeKind| {
                register_hint(reflection, name, convention, counts.range_offset(range))
            };

            for cb in &reflection.constant_buffers {
                let table_index = constant_buffers.assign(hint(&cb.name, RangeKind::ConstantBuffer))?;
                let slot = slot_at(view_table, counts.range_offset(RangeKind::ConstantBuffer) + table_index)?;
                let buffer = self.factory.create_constant_buffer(cb.size as u64, slot)?;
                engine_debug!(
                    self.console,
                    SOURCE,
                    "{:?} constant buffer '{}' ({} bytes) -> index {}",
                    stage,
                    cb.name,
                    cb.size,
                    table_index
                );
                registry.insert(BindingSlot {
                    name: cb.name.clone(),
                    stage,
                    size: cb.size as u64,
                    table_index,
                    slot,
                    resource: BindingResource::ConstantBuffer { buffer },
                })?;
            }

            for (i, view) in reflection.resource_views.iter().enumerate() {
                let range = view_range_kind(view.kind);
                let assigner = match range {
                    RangeKind::Texture => &mut textures,
                    _ => &mut storage_buffers,
                };
                let table_index = assigner.assign(hint(&view.name, range))?;
                let slot = slot_at(view_table, counts.range_offset(range) + table_index)?;
                let source = desc.views.get(i);
                let resource = self.factory.create_resource_view(view.kind, source, slot)?;
                engine_debug!(
                    self.console,
                    SOURCE,
                    "{:?} {:?} view '{}' -> index {}{}",
                    stage,
                    view.kind,
                    view.name,
                    table_index,
                    if source.is_some() { "" } else { " (unbound)" }
                );
                registry.insert(BindingSlot {
                    name: view.name.clone(),
                    stage,
                    size: source.map(view_size).unwrap_or(0),
                    table_index,
                    slot,
                    resource: BindingResource::ResourceView {
                        kind: view.kind,
                        view: resource,
                    },
                })?;
            }

            for sampler in &reflection.samplers {
                let table_index = samplers.assign(hint(&sampler.name, RangeKind::Sampler))?;
                let slot = slot_at(sampler_table, table_index)?;
                self.factory.create_sampler(&policy.default_sampler, slot)?;
                registry.insert(BindingSlot {
                    name: sampler.name.clone(),
                    stage,
                    size: 0,
                    table_index,
                    slot,
                    resource: BindingResource::Sampler {
                        desc: policy.default_sampler,
                    },
                })?;
            }
        }

        Ok(registry)
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
