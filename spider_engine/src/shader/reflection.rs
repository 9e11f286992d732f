/// Shader reflection data model
///
/// Backends introspect their bytecode format and feed the native resources
/// they find into a `ReflectionBuilder`. The builder classifies them the same
/// way for every backend: constant buffers, shader resource views that the
/// engine binds automatically (textures, structured and byte-address buffers),
/// samplers, and everything else, which is dropped.

use super::stage::ShaderStage;

/// Native kind of a resource declared by a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeResourceKind {
    ConstantBuffer,
    Texture,
    StructuredBuffer,
    ByteAddressBuffer,
    Sampler,
    /// Read-write buffer or image (UAV)
    Storage,
    InputAttachment,
    AccelerationStructure,
    Other,
}

/// Kind of a shader resource view slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceViewKind {
    Texture,
    Structured,
    ByteAddress,
}

impl ResourceViewKind {
    /// Whether the view is backed by a buffer (as opposed to a texture)
    pub fn is_buffer(self) -> bool {
        !matches!(self, ResourceViewKind::Texture)
    }
}

/// A member of a constant buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBufferInfo {
    pub name: String,
    pub register: u32,
    pub space: u32,
    /// Declared size in bytes, before any device alignment
    pub size: u32,
    pub variables: Vec<VariableInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceViewInfo {
    pub name: String,
    pub register: u32,
    pub space: u32,
    pub kind: ResourceViewKind,
    /// Element stride for structured buffers, 0 otherwise
    pub stride: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerInfo {
    pub name: String,
    pub register: u32,
    pub space: u32,
}

/// Raw binding point as emitted by the compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPoint {
    pub name: String,
    pub kind: NativeResourceKind,
    pub register: u32,
    pub space: u32,
    pub stage: ShaderStage,
}

/// Everything the engine needs to know about one compiled module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionResult {
    pub stage: ShaderStage,
    pub constant_buffers: Vec<ConstantBufferInfo>,
    pub resource_views: Vec<ResourceViewInfo>,
    pub samplers: Vec<SamplerInfo>,
    pub binding_points: Vec<BindingPoint>,
}

impl ReflectionResult {
    /// An empty reflection for `stage`
    pub fn empty(stage: ShaderStage) -> Self {
        Self {
            stage,
            constant_buffers: Vec::new(),
            resource_views: Vec::new(),
            samplers: Vec::new(),
            binding_points: Vec::new(),
        }
    }

    /// Slots this module needs in the constant-buffer / resource-view table
    pub fn view_slot_count(&self) -> u32 {
        (self.constant_buffers.len() + self.resource_views.len()) as u32
    }

    /// Slots this module needs in the sampler table
    pub fn sampler_slot_count(&self) -> u32 {
        self.samplers.len() as u32
    }

    /// Raw binding point for `name`, if the compiler emitted one
    pub fn binding_point(&self, name: &str) -> Option<&BindingPoint> {
        self.binding_points
            .iter()
            .find(|point| point.name == name && point.stage == self.stage)
    }

    pub fn constant_buffer(&self, name: &str) -> Option<&ConstantBufferInfo> {
        self.constant_buffers.iter().find(|cb| cb.name == name)
    }
}

/// Accumulates native resources into a `ReflectionResult`
#[derive(Debug)]
pub struct ReflectionBuilder {
    result: ReflectionResult,
}

impl ReflectionBuilder {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            result: ReflectionResult::empty(stage),
        }
    }

    /// Record a constant buffer and its members
    pub fn constant_buffer(
        &mut self,
        name: impl Into<String>,
        register: u32,
        space: u32,
        size: u32,
        variables: Vec<VariableInfo>,
    ) -> &mut Self {
        let name = name.into();
        self.point(&name, NativeResourceKind::ConstantBuffer, register, space);
        self.result.constant_buffers.push(ConstantBufferInfo {
            name,
            register,
            space,
            size,
            variables,
        });
        self
    }

    /// Record a non-constant-buffer resource
    ///
    /// Textures, structured and byte-address buffers become resource views,
    /// samplers become samplers, every other kind only leaves a raw binding
    /// point behind.
    pub fn resource(
        &mut self,
        name: impl Into<String>,
        kind: NativeResourceKind,
        register: u32,
        space: u32,
        stride: u32,
    ) -> &mut Self {
        let name = name.into();
        self.point(&name, kind, register, space);

        let view_kind = match kind {
            NativeResourceKind::Texture => Some(ResourceViewKind::Texture),
            NativeResourceKind::StructuredBuffer => Some(ResourceViewKind::Structured),
            NativeResourceKind::ByteAddressBuffer => Some(ResourceViewKind::ByteAddress),
            NativeResourceKind::Sampler => {
                self.result.samplers.push(SamplerInfo { name, register, space });
                return self;
            }
            _ => None,
        };

        if let Some(kind) = view_kind {
            self.result.resource_views.push(ResourceViewInfo {
                name,
                register,
                space,
                kind,
                stride: if kind == ResourceViewKind::Structured { stride } else { 0 },
            });
        }
        self
    }

    fn point(&mut self, name: &str, kind: NativeResourceKind, register: u32, space: u32) {
        self.result.binding_points.push(BindingPoint {
            name: name.to_string(),
            kind,
            register,
            space,
            stage: self.result.stage,
        });
    }

    pub fn finish(self) -> ReflectionResult {
        self.result
    }
}

#[cfg(test)]
#[path = "reflection_tests.rs"]
mod tests;
