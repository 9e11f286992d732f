/// GraphicsDevice trait - the backend the core orchestrates
///
/// A backend owns one device, one queue and one presentation surface. The
/// core never reaches past this trait; backend objects come back as trait
/// objects and go in again as `&dyn` references, which the backend downcasts
/// through `as_any`.

use std::sync::Arc;

use crate::error::Result;
use super::buffer::{Buffer, BufferDesc};
use super::command_list::CommandList;
use super::descriptor_table::{DescriptorCategory, DescriptorTable, DescriptorWrite};
use super::fence::Fence;
use super::pipeline::{BindingLayout, BindingLayoutDesc, PipelineState, PipelineStateDesc};
use super::texture::{Texture, TextureDesc};

pub trait GraphicsDevice: Send + Sync {
    // ===== DESCRIPTORS =====

    /// Create an empty descriptor table
    ///
    /// Failure is a device capability error and is fatal for the caller.
    fn create_descriptor_table(
        &self,
        category: DescriptorCategory,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<Arc<dyn DescriptorTable>>;

    /// Copy slots `[0, count)` of `src` into `dst` at the same offsets
    fn copy_descriptors(
        &self,
        src: &dyn DescriptorTable,
        dst: &dyn DescriptorTable,
        count: u32,
    ) -> Result<()>;

    /// Write one slot of `table`
    fn write_descriptor(
        &self,
        table: &dyn DescriptorTable,
        slot: u32,
        write: &DescriptorWrite<'_>,
    ) -> Result<()>;

    // ===== RESOURCES =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>>;

    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>>;

    fn create_pipeline_state(&self, desc: &PipelineStateDesc) -> Result<Arc<dyn PipelineState>>;

    // ===== SUBMISSION =====

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>>;

    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// Submit a closed command list to the queue
    fn submit(&self, command_list: &dyn CommandList) -> Result<()>;

    /// Enqueue a GPU-side signal of `fence` to `value` after all submitted work
    fn signal(&self, fence: &dyn Fence, value: u64) -> Result<()>;

    /// Block until the queue is idle
    fn wait_idle(&self) -> Result<()>;

    // ===== SURFACE =====

    /// Acquire the next surface image and open a render pass on it
    fn begin_surface_pass(
        &self,
        command_list: &mut dyn CommandList,
        clear_color: [f32; 4],
    ) -> Result<()>;

    /// Close the surface render pass and prepare the image for present
    fn end_surface_pass(&self, command_list: &mut dyn CommandList) -> Result<()>;

    fn present(&self, vsync: bool) -> Result<()>;

    /// Recreate the surface images for a new window size
    fn resize(&self, width: u32, height: u32) -> Result<()>;

    fn set_fullscreen(&self, fullscreen: bool) -> Result<()>;

    /// Current surface size in pixels
    fn surface_extent(&self) -> (u32, u32);
}
