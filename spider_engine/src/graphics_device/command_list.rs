/// CommandList trait - records GPU commands for later submission

use std::any::Any;

use crate::error::Result;
use super::buffer::Buffer;
use super::descriptor_table::DescriptorTable;
use super::pipeline::PipelineState;
use super::texture::Texture;

/// Index element size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    U16,
    U32,
}

/// Command recording context
///
/// `reset` starts recording and may only be called once the GPU has retired
/// the previous submission of this list. `close` ends recording; a closed
/// list is handed to `GraphicsDevice::submit`.
pub trait CommandList: Send {
    fn reset(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn is_recording(&self) -> bool;

    fn set_pipeline_state(&mut self, pipeline: &dyn PipelineState) -> Result<()>;

    /// Point binding-layout table `table_index` at `table`, starting at `base_slot`
    fn set_descriptor_table(
        &mut self,
        table_index: u32,
        table: &dyn DescriptorTable,
        base_slot: u32,
    ) -> Result<()>;

    fn set_vertex_buffer(&mut self, buffer: &dyn Buffer, stride: u32) -> Result<()>;

    fn set_index_buffer(&mut self, buffer: &dyn Buffer, format: IndexFormat) -> Result<()>;

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32) -> Result<()>;

    /// Copy tightly packed texels from `src` into mip 0 of `dst`
    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, dst: &dyn Texture) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
