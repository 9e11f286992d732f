//! Shader stages, compilation seams and reflection

mod module;
mod reflection;
mod stage;

pub use module::{
    RegisterConvention, ShaderCompiler, ShaderDesc, ShaderModule, ShaderReflector, ShaderSource,
};
pub use reflection::{
    BindingPoint, ConstantBufferInfo, NativeResourceKind, ReflectionBuilder, ReflectionResult,
    ResourceViewInfo, ResourceViewKind, SamplerInfo, VariableInfo,
};
pub use stage::{ShaderStage, ShaderVisibility, StageMask};
