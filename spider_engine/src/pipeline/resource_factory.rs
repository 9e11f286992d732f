/// ResourceFactory - creates the GPU objects behind binding slots
///
/// The pipeline builder and the binding registry only see this trait; the
/// renderer hands them an `ArenaResourceFactory` that creates resources on
/// its device and writes their descriptors through its arena allocator.

use std::sync::Arc;

use crate::descriptor::{ArenaAllocator, SlotRef};
use crate::error::{Error, Result};
use crate::graphics_device::{
    align_constant_buffer_size, BufferDesc, BufferUsage, Buffer, DescriptorWrite, GraphicsDevice,
    SamplerDesc,
};
use crate::shader::ResourceViewKind;
use super::binding::{ViewResource, ViewSource};

/// Byte-address views address the buffer in 32-bit words
const RAW_VIEW_STRIDE: u32 = 4;

pub trait ResourceFactory: Send + Sync {
    /// Create a mapped constant buffer of at least `size` bytes and point
    /// `slot` at it
    fn create_constant_buffer(&self, size: u64, slot: SlotRef) -> Result<Arc<dyn Buffer>>;

    /// Create the view described by `source` and point `slot` at it
    ///
    /// `None` writes a null view and returns `ViewResource::Unbound`.
    fn create_resource_view(
        &self,
        kind: ResourceViewKind,
        source: Option<&ViewSource>,
        slot: SlotRef,
    ) -> Result<ViewResource>;

    /// Write a sampler described by `desc` into `slot`
    fn create_sampler(&self, desc: &SamplerDesc, slot: SlotRef) -> Result<()>;
}

pub struct ArenaResourceFactory {
    device: Arc<dyn GraphicsDevice>,
    allocator: Arc<ArenaAllocator>,
}

impl ArenaResourceFactory {
    pub fn new(device: Arc<dyn GraphicsDevice>, allocator: Arc<ArenaAllocator>) -> Self {
        Self { device, allocator }
    }

    fn create_view_buffer(
        &self,
        kind: ResourceViewKind,
        data: &[u8],
        stride: u32,
    ) -> Result<ViewResource> {
        let (usage, stride) = match kind {
            ResourceViewKind::Structured => (BufferUsage::Structured, stride),
            ResourceViewKind::ByteAddress => (BufferUsage::Raw, RAW_VIEW_STRIDE),
            ResourceViewKind::Texture => {
                return Err(Error::InvalidResource(
                    "buffer data bound to a texture view".to_string(),
                ))
            }
        };
        if data.is_empty() {
            return Err(Error::InvalidResource("empty resource view data".to_string()));
        }
        if stride == 0 || data.len() % stride as usize != 0 {
            return Err(Error::InvalidResource(format!(
                "{} bytes of view data is not a whole number of {}-byte elements",
                data.len(),
                stride
            )));
        }

        let buffer = self.device.create_buffer(&BufferDesc {
            size: data.len() as u64,
            usage,
        })?;
        buffer.update(0, data)?;
        Ok(ViewResource::Buffer {
            buffer,
            stride,
            count: (data.len() / stride as usize) as u32,
        })
    }
}

impl ResourceFactory for ArenaResourceFactory {
    fn create_constant_buffer(&self, size: u64, slot: SlotRef) -> Result<Arc<dyn Buffer>> {
        let size = align_constant_buffer_size(size.max(1));
        let buffer = self.device.create_buffer(&BufferDesc {
            size,
            usage: BufferUsage::Constant,
        })?;
        self.allocator.write(
            slot,
            &DescriptorWrite::ConstantBuffer {
                buffer: buffer.as_ref(),
            },
        )?;
        Ok(buffer)
    }

    fn create_resource_view(
        &self,
        kind: ResourceViewKind,
        source: Option<&ViewSource>,
        slot: SlotRef,
    ) -> Result<ViewResource> {
        let view = match source {
            None => ViewResource::Unbound,
            Some(ViewSource::Texture(texture)) => {
                if kind != ResourceViewKind::Texture {
                    return Err(Error::InvalidResource(format!(
                        "texture bound to a {:?} view",
                        kind
                    )));
                }
                ViewResource::Texture {
                    texture: texture.clone(),
                }
            }
            Some(ViewSource::Buffer { data, stride }) => {
                self.create_view_buffer(kind, data, *stride)?
            }
        };
        self.allocator.write(slot, &view.descriptor_write(kind))?;
        Ok(view)
    }

    fn create_sampler(&self, desc: &SamplerDesc, slot: SlotRef) -> Result<()> {
        self.allocator.write(slot, &DescriptorWrite::Sampler(desc))
    }
}

#[cfg(test)]
#[path = "resource_factory_tests.rs"]
mod tests;
