/// Buffer trait and buffer descriptor

use std::any::Any;

use crate::error::Result;

/// Constant buffer views must start and end on this boundary
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Round a constant buffer size up to `CONSTANT_BUFFER_ALIGNMENT`
pub fn align_constant_buffer_size(size: u64) -> u64 {
    (size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Constant buffer, persistently mapped
    Constant,
    /// Structured buffer read through a resource view
    Structured,
    /// Byte-address buffer read through a resource view
    Raw,
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
    /// CPU-written source of a copy
    Staging,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
}

/// GPU buffer
///
/// Every buffer the core creates is host-visible and mapped for its whole
/// lifetime; `update` writes straight into the mapping.
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    fn usage(&self) -> BufferUsage;

    /// Copy `data` into the buffer at `offset`
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Check that `data` fits at `offset` in a buffer of `size` bytes
pub fn check_buffer_range(size: u64, offset: u64, data: &[u8]) -> Result<()> {
    let end = offset.checked_add(data.len() as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(crate::error::Error::InvalidResource(format!(
            "write of {} bytes at offset {} exceeds buffer size {}",
            data.len(),
            offset,
            size
        ))),
    }
}
