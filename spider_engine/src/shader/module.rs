/// Shader compiler / reflector seams and compiled shader modules

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::pipeline::ViewSource;
use super::reflection::ReflectionResult;
use super::stage::{ShaderStage, ShaderVisibility};

/// Where shader code comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    /// Source text, compiled by the compiler
    Text(String),
    /// Path to a source or bytecode file
    File(PathBuf),
    /// Already compiled bytecode
    Bytecode(Vec<u8>),
}

/// One shader of a pipeline, as described by the caller
///
/// `views` are the initial contents of the resource views the shader
/// declares, matched in declaration order. Views without a source start
/// unbound and are filled later with `bind_resource_view`.
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub source: ShaderSource,
    pub visibility: ShaderVisibility,
    pub entry_point: String,
    pub views: Vec<ViewSource>,
}

impl ShaderDesc {
    /// Describe a shader with the `main` entry point
    pub fn new(source: ShaderSource, visibility: ShaderVisibility) -> Self {
        Self {
            source,
            visibility,
            entry_point: "main".to_string(),
            views: Vec::new(),
        }
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Append the initial content of the next declared resource view
    pub fn with_view(mut self, view: ViewSource) -> Self {
        self.views.push(view);
        self
    }
}

/// Turns a shader description into bytecode for one stage
///
/// Failures carry the compiler diagnostic in `Error::ShaderCompilation`.
pub trait ShaderCompiler: Send + Sync {
    fn compile(&self, desc: &ShaderDesc, stage: ShaderStage) -> Result<Vec<u8>>;
}

/// How a reflector numbers the registers it reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegisterConvention {
    /// One register space per resource kind (`b0`, `t0`, `s0`)
    #[default]
    PerKind,
    /// Registers are absolute slots of the table the binding lives in:
    /// constant buffers first, then textures, then storage buffers
    TableSlot,
}

/// Extracts binding metadata from compiled bytecode
///
/// Pure metadata extraction, never allocates GPU resources. Malformed
/// bytecode is `Error::ShaderReflection`.
pub trait ShaderReflector: Send + Sync {
    fn reflect(&self, bytecode: &[u8], stage: ShaderStage) -> Result<ReflectionResult>;

    /// Numbering of the `register` fields in reflected bindings
    fn register_convention(&self) -> RegisterConvention {
        RegisterConvention::PerKind
    }
}

/// A compiled and reflected shader. Immutable.
#[derive(Debug, Clone)]
pub struct ShaderModule {
    stage: ShaderStage,
    entry_point: String,
    bytecode: Arc<[u8]>,
    reflection: ReflectionResult,
}

impl ShaderModule {
    /// Compile `desc` for `stage` and reflect the result
    pub fn compile(
        desc: &ShaderDesc,
        stage: ShaderStage,
        compiler: &dyn ShaderCompiler,
        reflector: &dyn ShaderReflector,
    ) -> Result<Self> {
        let bytecode = compiler.compile(desc, stage)?;
        let reflection = reflector.reflect(&bytecode, stage)?;
        Ok(Self {
            stage,
            entry_point: desc.entry_point.clone(),
            bytecode: bytecode.into(),
            reflection,
        })
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn bytecode(&self) -> &Arc<[u8]> {
        &self.bytecode
    }

    pub fn reflection(&self) -> &ReflectionResult {
        &self.reflection
    }
}
