/// Shader stages
///
/// `ShaderVisibility` is what a caller may ask for when describing a shader;
/// it mirrors every stage a graphics API can name. `ShaderStage` is the closed
/// set this engine compiles and binds. Converting between the two is where
/// unsupported requests are rejected.

use bitflags::bitflags;

use crate::error::{Error, Result};

/// A stage the engine compiles, reflects and binds resources for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    /// Every supported stage, in pipeline order
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Pixel];

    /// Single-bit mask for this stage
    pub fn mask(self) -> StageMask {
        match self {
            ShaderStage::Vertex => StageMask::VERTEX,
            ShaderStage::Pixel => StageMask::PIXEL,
        }
    }

    /// Conventional target profile prefix ("vs", "ps")
    pub fn profile_prefix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
        }
    }
}

/// Stage requested by a shader description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVisibility {
    All,
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Amplification,
    Mesh,
}

impl TryFrom<ShaderVisibility> for ShaderStage {
    type Error = Error;

    fn try_from(visibility: ShaderVisibility) -> Result<Self> {
        match visibility {
            ShaderVisibility::Vertex => Ok(ShaderStage::Vertex),
            ShaderVisibility::Pixel => Ok(ShaderStage::Pixel),
            ShaderVisibility::All => Err(Error::InvalidStage(
                "a single shader module cannot target all stages".to_string(),
            )),
            other => Err(Error::InvalidStage(format!(
                "{:?} stage is not supported",
                other
            ))),
        }
    }
}

impl From<ShaderStage> for ShaderVisibility {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => ShaderVisibility::Vertex,
            ShaderStage::Pixel => ShaderVisibility::Pixel,
        }
    }
}

bitflags! {
    /// Set of stages a descriptor table is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StageMask: u32 {
        const VERTEX = 0x01;
        const PIXEL = 0x02;
    }
}

impl StageMask {
    /// Build a mask from stages
    pub fn from_stages<I: IntoIterator<Item = ShaderStage>>(stages: I) -> Self {
        stages
            .into_iter()
            .fold(StageMask::empty(), |mask, stage| mask | stage.mask())
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
