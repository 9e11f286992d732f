/// SPIR-V shader tools - compiler and reflector seams of the Vulkan backend
///
/// Shaders reach the Vulkan backend as SPIR-V compiled offline (glslc, dxc
/// `-spirv`, slangc). `SpirvCompiler` validates and passes it through,
/// `SpirqReflector` introspects it with spirq and reports descriptors as
/// native resources, with `register` = binding and `space` = set.

use spider_engine::spider::shader::{
    NativeResourceKind, ReflectionBuilder, ReflectionResult, RegisterConvention, ShaderCompiler, ShaderDesc,
    ShaderReflector, ShaderSource, ShaderStage, VariableInfo,
};
use spider_engine::spider::{Error, Result};
use spirq::ty::{AccessType, DescriptorType, ScalarType, Type};
use spirq::var::Variable;

const SPIRV_MAGIC: u32 = 0x0723_0203;
/// Header words: magic, version, generator, bound, schema
const SPIRV_HEADER_BYTES: usize = 20;

/// Check that `bytes` looks like a little-endian SPIR-V module
pub(crate) fn validate_spirv(bytes: &[u8], what: &str) -> Result<()> {
    if bytes.len() < SPIRV_HEADER_BYTES || bytes.len() % 4 != 0 {
        return Err(Error::ShaderCompilation(format!(
            "{}: {} bytes is not a SPIR-V module (needs a 20 byte header and whole words)",
            what,
            bytes.len()
        )));
    }
    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != SPIRV_MAGIC {
        return Err(Error::ShaderCompilation(format!(
            "{}: bad SPIR-V magic {:#010x}, compile shaders to SPIR-V offline",
            what, magic
        )));
    }
    Ok(())
}

// ============================================================================
// COMPILER
// ============================================================================

/// Accepts precompiled SPIR-V from memory or from a file
#[derive(Debug, Default, Clone, Copy)]
pub struct SpirvCompiler;

impl ShaderCompiler for SpirvCompiler {
    fn compile(&self, desc: &ShaderDesc, stage: ShaderStage) -> Result<Vec<u8>> {
        match &desc.source {
            ShaderSource::Bytecode(bytes) => {
                validate_spirv(bytes, &format!("{:?} bytecode", stage))?;
                Ok(bytes.clone())
            }
            ShaderSource::File(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    Error::ShaderCompilation(format!("cannot read shader file {}: {}", path.display(), e))
                })?;
                validate_spirv(&bytes, &path.display().to_string())?;
                Ok(bytes)
            }
            ShaderSource::Text(_) => Err(Error::ShaderCompilation(format!(
                "{:?} shader given as source text; the Vulkan backend takes SPIR-V, compile it offline",
                stage
            ))),
        }
    }
}

// ============================================================================
// REFLECTOR
// ============================================================================

/// Reflects SPIR-V descriptors with spirq
#[derive(Debug, Default, Clone, Copy)]
pub struct SpirqReflector;

/// Element of the runtime array a storage buffer block wraps, if any
fn runtime_array_element(ty: &Type) -> Option<(&Type, u32)> {
    let Type::Struct(block) = ty else {
        return None;
    };
    let last = block.members.last()?;
    match &last.ty {
        Type::Array(array) if array.nelement.is_none() => {
            Some((&*array.element_ty, array.stride.map(|s| s as u32).unwrap_or(0)))
        }
        _ => None,
    }
}

/// Native kind and element stride of a descriptor
///
/// Read-only storage buffers over a bare `uint` array are byte-address
/// buffers (that is how `ByteAddressBuffer` lowers to SPIR-V); other
/// read-only storage buffers are structured buffers.
fn native_kind(desc_ty: &DescriptorType, ty: &Type) -> (NativeResourceKind, u32) {
    match desc_ty {
        DescriptorType::UniformBuffer(..) => (NativeResourceKind::ConstantBuffer, 0),
        DescriptorType::SampledImage(..) => (NativeResourceKind::Texture, 0),
        DescriptorType::Sampler(..) => (NativeResourceKind::Sampler, 0),
        DescriptorType::StorageBuffer(AccessType::ReadOnly) => match runtime_array_element(ty) {
            Some((Type::Scalar(ScalarType::Integer { bits: 32, is_signed: false }), _)) => {
                (NativeResourceKind::ByteAddressBuffer, 0)
            }
            Some((_, stride)) => (NativeResourceKind::StructuredBuffer, stride),
            None => (NativeResourceKind::StructuredBuffer, ty.nbyte().unwrap_or(0) as u32),
        },
        DescriptorType::StorageBuffer(..) | DescriptorType::StorageImage(..) | DescriptorType::StorageTexelBuffer(..) => {
            (NativeResourceKind::Storage, 0)
        }
        DescriptorType::InputAttachment(..) => (NativeResourceKind::InputAttachment, 0),
        DescriptorType::AccelStruct(..) => (NativeResourceKind::AccelerationStructure, 0),
        _ => (NativeResourceKind::Other, 0),
    }
}

/// Members of a uniform block
fn block_variables(ty: &Type) -> Vec<VariableInfo> {
    match ty {
        Type::Struct(block) => block
            .members
            .iter()
            .map(|member| VariableInfo {
                name: member.name.clone().unwrap_or_default(),
                offset: member.offset.unwrap_or(0) as u32,
                size: member.ty.nbyte().unwrap_or(0) as u32,
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl ShaderReflector for SpirqReflector {
    fn reflect(&self, bytecode: &[u8], stage: ShaderStage) -> Result<ReflectionResult> {
        validate_spirv(bytecode, &format!("{:?} bytecode", stage)).map_err(|e| match e {
            Error::ShaderCompilation(message) => Error::ShaderReflection(message),
            other => other,
        })?;
        let words = ash::util::read_spv(&mut std::io::Cursor::new(bytecode))
            .map_err(|e| Error::ShaderReflection(format!("{:?} bytecode unreadable: {}", stage, e)))?;

        let entry_points = spirq::ReflectConfig::new()
            .spv(&words[..])
            .ref_all_rscs(true)
            .reflect()
            .map_err(|e| Error::ShaderReflection(format!("SPIR-V reflection failed: {:?}", e)))?;

        let mut builder = ReflectionBuilder::new(stage);
        let mut seen = Vec::new();

        for entry_point in &entry_points {
            for var in &entry_point.vars {
                let Variable::Descriptor { name, desc_bind, desc_ty, ty, .. } = var else {
                    continue;
                };
                let (set, binding) = (desc_bind.set(), desc_bind.bind());
                // Entry points of one module share their descriptors
                if seen.contains(&(set, binding)) {
                    continue;
                }
                seen.push((set, binding));

                let name = name
                    .clone()
                    .unwrap_or_else(|| format!("set{}_binding{}", set, binding));
                match native_kind(desc_ty, ty) {
                    (NativeResourceKind::ConstantBuffer, _) => {
                        let size = ty.nbyte().unwrap_or(0) as u32;
                        builder.constant_buffer(name, binding, set, size, block_variables(ty));
                    }
                    (kind, stride) => {
                        builder.resource(name, kind, binding, set, stride);
                    }
                }
            }
        }

        Ok(builder.finish())
    }

    /// Bindings number the whole descriptor set, not one resource kind
    fn register_convention(&self) -> RegisterConvention {
        RegisterConvention::TableSlot
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
