/// Pipeline module - shader bindings, their registry and the layout builder

pub mod binding;
pub mod resource_factory;
pub mod registry;
pub mod layout;
pub mod render_pipeline;
pub mod builder;

pub use binding::{BindingResource, BindingSlot, ViewResource, ViewSource};
pub use resource_factory::{ArenaResourceFactory, ResourceFactory};
pub use registry::BindingRegistry;
pub use layout::{PipelineLayout, RangeCounts, SAMPLER_TABLE_INDEX, VIEW_TABLE_INDEX};
pub use render_pipeline::{
    ConstantBufferRequirement, PipelineRequirements, RenderPipeline, ResourceViewRequirement,
};
pub use builder::{PipelineLayoutBuilder, PipelinePolicy, ShaderTools};
