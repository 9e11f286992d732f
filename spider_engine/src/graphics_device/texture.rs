/// Texture trait and texture descriptor

use std::any::Any;

/// Texture formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R32_SFLOAT,
    R32G32B32A32_SFLOAT,
    D32_SFLOAT,
}

impl TextureFormat {
    /// Size of one texel in bytes
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::B8G8R8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::R32_SFLOAT
            | TextureFormat::D32_SFLOAT => 4,
            TextureFormat::R32G32B32A32_SFLOAT => 16,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::D32_SFLOAT)
    }
}

/// Descriptor for creating a 2D sampled texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl TextureDesc {
    /// Bytes needed to fill mip 0
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() as u64
    }
}

/// GPU texture
pub trait Texture: Send + Sync {
    fn desc(&self) -> &TextureDesc;

    fn as_any(&self) -> &dyn Any;
}
