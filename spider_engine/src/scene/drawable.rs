/// Meshes and the objects that draw them

use std::sync::Arc;

use crate::graphics_device::{Buffer, IndexFormat};
use super::transform::Transform;

/// GPU buffers of an indexed mesh
#[derive(Clone)]
pub struct MeshBuffers {
    pub vertex_buffer: Arc<dyn Buffer>,
    pub index_buffer: Arc<dyn Buffer>,
    pub vertex_stride: u32,
    pub index_format: IndexFormat,
    pub index_count: u32,
}

impl std::fmt::Debug for MeshBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshBuffers")
            .field("vertex_bytes", &self.vertex_buffer.size())
            .field("vertex_stride", &self.vertex_stride)
            .field("index_format", &self.index_format)
            .field("index_count", &self.index_count)
            .finish()
    }
}

/// A mesh placed in the world
#[derive(Debug, Clone)]
pub struct Drawable {
    pub transform: Transform,
    pub mesh: MeshBuffers,
}

impl Drawable {
    pub fn new(mesh: MeshBuffers) -> Self {
        Self {
            transform: Transform::default(),
            mesh,
        }
    }
}
