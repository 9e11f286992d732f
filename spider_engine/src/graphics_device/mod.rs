/// Graphics device module - the backend interface the core drives

pub mod graphics_device;
pub mod buffer;
pub mod texture;
pub mod sampler;
pub mod descriptor_table;
pub mod fence;
pub mod command_list;
pub mod pipeline;

pub use graphics_device::*;
pub use buffer::*;
pub use texture::*;
pub use sampler::*;
pub use descriptor_table::*;
pub use fence::*;
pub use command_list::*;
pub use pipeline::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
