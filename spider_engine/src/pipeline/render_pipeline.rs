/// RenderPipeline - compiled shaders, their layout and their bindings

use crate::descriptor::SlotRange;
use crate::error::Result;
use crate::shader::{ResourceViewKind, ShaderModule, ShaderStage, VariableInfo};
use super::binding::{BindingResource, ViewSource};
use super::layout::PipelineLayout;
use super::registry::BindingRegistry;
use super::resource_factory::ResourceFactory;

/// A constant buffer a pipeline expects the caller to fill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBufferRequirement {
    pub name: String,
    pub stage: ShaderStage,
    pub size: u32,
    pub variables: Vec<VariableInfo>,
}

/// A resource view a pipeline expects the caller to bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceViewRequirement {
    pub name: String,
    pub stage: ShaderStage,
    pub kind: ResourceViewKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineRequirements {
    pub constant_buffers: Vec<ConstantBufferRequirement>,
    pub resource_views: Vec<ResourceViewRequirement>,
}

#[derive(Debug)]
pub struct RenderPipeline {
    modules: Vec<ShaderModule>,
    layout: PipelineLayout,
    registry: BindingRegistry,
    view_table: Option<SlotRange>,
    sampler_table: Option<SlotRange>,
}

impl RenderPipeline {
    pub(crate) fn new(
        modules: Vec<ShaderModule>,
        layout: PipelineLayout,
        registry: BindingRegistry,
        view_table: Option<SlotRange>,
        sampler_table: Option<SlotRange>,
    ) -> Self {
        Self {
            modules,
            layout,
            registry,
            view_table,
            sampler_table,
        }
    }

    pub fn modules(&self) -> &[ShaderModule] {
        &self.modules
    }

    pub fn module(&self, stage: ShaderStage) -> Option<&ShaderModule> {
        self.modules.iter().find(|module| module.stage() == stage)
    }

    pub fn layout(&self) -> &PipelineLayout {
        &self.layout
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    /// Constant buffer and resource view slots, `None` when the shaders declare none
    pub fn view_table(&self) -> Option<SlotRange> {
        self.view_table
    }

    pub fn sampler_table(&self) -> Option<SlotRange> {
        self.sampler_table
    }

    pub fn bind_constant(&self, name: &str, stage: ShaderStage, data: &[u8]) -> Result<()> {
        self.registry.bind_constant(name, stage, data)
    }

    /// Write a `Pod` value into the constant buffer bound as `name`
    pub fn bind_value<T: bytemuck::Pod>(&self, name: &str, stage: ShaderStage, value: &T) -> Result<()> {
        self.registry.bind_constant(name, stage, bytemuck::bytes_of(value))
    }

    pub fn bind_resource_view(
        &mut self,
        name: &str,
        stage: ShaderStage,
        source: &ViewSource,
        factory: &dyn ResourceFactory,
    ) -> Result<BindingResource> {
        self.registry.bind_resource_view(name, stage, source, factory)
    }

    /// What the shaders of this pipeline read, in declaration order
    pub fn requirements(&self) -> PipelineRequirements {
        let mut requirements = PipelineRequirements::default();
        for module in &self.modules {
            let reflection = module.reflection();
            requirements
                .constant_buffers
                .extend(reflection.constant_buffers.iter().map(|cb| ConstantBufferRequirement {
                    name: cb.name.clone(),
                    stage: module.stage(),
                    size: cb.size,
                    variables: cb.variables.clone(),
                }));
            requirements
                .resource_views
                .extend(reflection.resource_views.iter().map(|view| ResourceViewRequirement {
                    name: view.name.clone(),
                    stage: module.stage(),
                    kind: view.kind,
                }));
        }
        requirements
    }
}
