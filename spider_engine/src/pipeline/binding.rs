/// Binding slots - what one (name, stage) binding of a pipeline points at

use std::fmt;
use std::sync::Arc;

use crate::descriptor::SlotRef;
use crate::graphics_device::{Buffer, DescriptorWrite, SamplerDesc, Texture};
use crate::shader::{ResourceViewKind, ShaderStage};

/// Caller-supplied content of a resource view
#[derive(Clone)]
pub enum ViewSource {
    /// An already uploaded texture
    Texture(Arc<dyn Texture>),
    /// Raw element data, copied into a new buffer
    Buffer { data: Vec<u8>, stride: u32 },
}

impl fmt::Debug for ViewSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewSource::Texture(texture) => f
                .debug_struct("Texture")
                .field("width", &texture.desc().width)
                .field("height", &texture.desc().height)
                .finish(),
            ViewSource::Buffer { data, stride } => f
                .debug_struct("Buffer")
                .field("len", &data.len())
                .field("stride", stride)
                .finish(),
        }
    }
}

/// GPU object behind a resource view slot
#[derive(Clone)]
pub enum ViewResource {
    /// Declared by the shader but not bound yet; the slot holds a null view
    Unbound,
    Buffer {
        buffer: Arc<dyn Buffer>,
        stride: u32,
        count: u32,
    },
    Texture {
        texture: Arc<dyn Texture>,
    },
}

impl ViewResource {
    /// Descriptor write that points a slot of `kind` at this resource
    pub fn descriptor_write(&self, kind: ResourceViewKind) -> DescriptorWrite<'_> {
        match self {
            ViewResource::Unbound => DescriptorWrite::Null,
            ViewResource::Texture { texture } => DescriptorWrite::Texture {
                texture: texture.as_ref(),
            },
            ViewResource::Buffer { buffer, stride, count } => match kind {
                ResourceViewKind::ByteAddress => DescriptorWrite::RawBuffer {
                    buffer: buffer.as_ref(),
                },
                _ => DescriptorWrite::StructuredBuffer {
                    buffer: buffer.as_ref(),
                    stride: *stride,
                    element_count: *count,
                },
            },
        }
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self, ViewResource::Unbound)
    }
}

/// Resource held by a binding slot
#[derive(Clone)]
pub enum BindingResource {
    /// Persistently mapped constant buffer
    ConstantBuffer { buffer: Arc<dyn Buffer> },
    ResourceView {
        kind: ResourceViewKind,
        view: ViewResource,
    },
    Sampler { desc: SamplerDesc },
}

impl BindingResource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            BindingResource::ConstantBuffer { .. } => "constant buffer",
            BindingResource::ResourceView { .. } => "resource view",
            BindingResource::Sampler { .. } => "sampler",
        }
    }
}

impl fmt::Debug for BindingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingResource::ConstantBuffer { buffer } => {
                write!(f, "ConstantBuffer({} bytes)", buffer.size())
            }
            BindingResource::ResourceView { kind, view } => {
                write!(f, "ResourceView({:?}, bound: {})", kind, view.is_bound())
            }
            BindingResource::Sampler { desc } => write!(f, "Sampler({:?})", desc),
        }
    }
}

/// One entry of a pipeline's binding registry
#[derive(Debug, Clone)]
pub struct BindingSlot {
    pub name: String,
    pub stage: ShaderStage,
    /// Bytes the shader declared (constant buffers) or the bound view size
    pub size: u64,
    /// Index inside the pipeline's range of the table kind
    pub table_index: u32,
    /// Arena slot holding the descriptor
    pub slot: SlotRef,
    pub resource: BindingResource,
}
