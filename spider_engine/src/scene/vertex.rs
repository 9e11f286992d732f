/// Vertex format and per-draw constants

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::graphics_device::{BufferFormat, VertexAttribute, VertexLayout};

/// Interleaved vertex: position, normal, texture coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }

    /// Locations 0, 1 and 2 in field order
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<Vertex>() as u32,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: BufferFormat::R32G32B32_SFLOAT,
                    offset: std::mem::offset_of!(Vertex, position) as u32,
                },
                VertexAttribute {
                    location: 1,
                    format: BufferFormat::R32G32B32_SFLOAT,
                    offset: std::mem::offset_of!(Vertex, normal) as u32,
                },
                VertexAttribute {
                    location: 2,
                    format: BufferFormat::R32G32_SFLOAT,
                    offset: std::mem::offset_of!(Vertex, uv) as u32,
                },
            ],
        }
    }
}

/// Contents of the `frameData` constant buffer of the vertex stage
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameData {
    pub projection: Mat4,
    pub view: Mat4,
    pub model: Mat4,
}

impl FrameData {
    pub const BINDING_NAME: &'static str = "frameData";
}

#[cfg(test)]
#[path = "vertex_tests.rs"]
mod tests;
