/// Binding layouts and pipeline state objects

use std::any::Any;
use std::sync::Arc;

use super::descriptor_table::DescriptorCategory;
use super::texture::TextureFormat;
use crate::shader::{ShaderStage, StageMask};

/// Kind of slots covered by a table range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeKind {
    ConstantBuffer,
    Texture,
    /// Structured or byte-address buffer view
    StorageBuffer,
    Sampler,
}

/// Contiguous run of same-kind slots inside a descriptor table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRange {
    pub kind: RangeKind,
    /// First slot of the range, relative to the table start
    pub offset: u32,
    pub count: u32,
}

/// One descriptor table of a binding layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDesc {
    pub category: DescriptorCategory,
    /// Ranges in slot order; empty ranges are allowed
    pub ranges: Vec<TableRange>,
    pub visibility: StageMask,
}

impl TableDesc {
    /// Total slots spanned by the table
    pub fn slot_count(&self) -> u32 {
        self.ranges.iter().map(|range| range.count).sum()
    }
}

/// Description of how descriptor tables map to shader binding points
///
/// Table `i` is bound with `CommandList::set_descriptor_table(i, ..)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingLayoutDesc {
    pub tables: Vec<TableDesc>,
}

/// Compiled binding layout (root signature / pipeline layout)
pub trait BindingLayout: Send + Sync {
    fn desc(&self) -> &BindingLayoutDesc;

    fn as_any(&self) -> &dyn Any;
}

/// Vertex attribute data format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
}

impl BufferFormat {
    pub fn size(self) -> u32 {
        match self {
            BufferFormat::R32G32_SFLOAT => 8,
            BufferFormat::R32G32B32_SFLOAT => 12,
            BufferFormat::R32G32B32A32_SFLOAT => 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    pub format: BufferFormat,
    /// Byte offset inside the vertex
    pub offset: u32,
}

/// Layout of the single interleaved vertex stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Fixed-function state of a graphics pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RasterState {
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub depth_test: bool,
    pub color_format: TextureFormat,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::Back,
            depth_test: false,
            color_format: TextureFormat::B8G8R8A8_SRGB,
        }
    }
}

/// Bytecode of one stage
#[derive(Debug, Clone)]
pub struct StageBytecode {
    pub stage: ShaderStage,
    pub bytecode: Arc<[u8]>,
    pub entry_point: String,
}

/// Everything needed to compile a pipeline state object
#[derive(Clone)]
pub struct PipelineStateDesc {
    pub stages: Vec<StageBytecode>,
    pub binding_layout: Arc<dyn BindingLayout>,
    pub vertex_layout: VertexLayout,
    pub raster: RasterState,
}

/// Compiled graphics pipeline
pub trait PipelineState: Send + Sync {
    fn binding_layout(&self) -> &Arc<dyn BindingLayout>;

    fn as_any(&self) -> &dyn Any;
}
