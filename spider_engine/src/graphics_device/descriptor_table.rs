/// Descriptor tables and the writes that fill their slots

use std::any::Any;

use super::buffer::Buffer;
use super::sampler::SamplerDesc;
use super::texture::Texture;

/// Category of slots a descriptor table holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorCategory {
    /// Constant buffer and shader resource views
    ResourceView,
    Sampler,
}

/// Fixed-capacity table of GPU-addressable descriptor slots
///
/// Tables never grow; the arena allocator replaces a full table with a
/// larger one and copies the live slots across.
pub trait DescriptorTable: Send + Sync {
    fn category(&self) -> DescriptorCategory;

    /// Number of slots
    fn capacity(&self) -> u32;

    /// Whether shaders read this table directly
    fn shader_visible(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// Content written into one descriptor slot
#[derive(Clone, Copy)]
pub enum DescriptorWrite<'a> {
    /// Reserve the slot without pointing it at anything
    Null,
    ConstantBuffer {
        buffer: &'a dyn Buffer,
    },
    StructuredBuffer {
        buffer: &'a dyn Buffer,
        stride: u32,
        element_count: u32,
    },
    RawBuffer {
        buffer: &'a dyn Buffer,
    },
    Texture {
        texture: &'a dyn Texture,
    },
    Sampler(&'a SamplerDesc),
}

impl DescriptorWrite<'_> {
    /// Table category this write belongs in, `None` for `Null`
    pub fn category(&self) -> Option<DescriptorCategory> {
        match self {
            DescriptorWrite::Null => None,
            DescriptorWrite::Sampler(_) => Some(DescriptorCategory::Sampler),
            _ => Some(DescriptorCategory::ResourceView),
        }
    }

    /// Short name for logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            DescriptorWrite::Null => "null",
            DescriptorWrite::ConstantBuffer { .. } => "constant buffer",
            DescriptorWrite::StructuredBuffer { .. } => "structured buffer",
            DescriptorWrite::RawBuffer { .. } => "raw buffer",
            DescriptorWrite::Texture { .. } => "texture",
            DescriptorWrite::Sampler(_) => "sampler",
        }
    }
}

impl std::fmt::Debug for DescriptorWrite<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind_name())
    }
}
