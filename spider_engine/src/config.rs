//! Renderer configuration

use crate::error::{Error, Result};

/// Default number of descriptor slots reserved per arena
pub const DEFAULT_ARENA_CAPACITY: u32 = 2048;

/// Renderer configuration
///
/// Every field has a usable default; override with struct update syntax:
///
/// ```no_run
/// use spider_engine::spider::RendererConfig;
///
/// let config = RendererConfig {
///     vsync: false,
///     thread_count: 2,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Frames in flight
    pub buffer_count: u32,
    /// Background upload contexts
    pub thread_count: u32,
    /// Start in borderless full-screen
    pub fullscreen: bool,
    /// Present synchronized to vertical blank
    pub vsync: bool,
    /// Index of the adapter to open, in enumeration order
    pub device_index: u32,
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Initial capacity of every descriptor arena
    pub descriptor_arena_capacity: u32,
    /// Clear color of the surface render pass
    pub clear_color: [f32; 4],
}

impl RendererConfig {
    /// Reject configurations the renderer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_count == 0 {
            return Err(Error::InitializationFailed(
                "buffer_count must be at least 1".to_string(),
            ));
        }
        if self.descriptor_arena_capacity == 0 {
            return Err(Error::InitializationFailed(
                "descriptor_arena_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            buffer_count: 2,
            thread_count: 4,
            fullscreen: false,
            vsync: true,
            device_index: 0,
            enable_validation: cfg!(debug_assertions),
            app_name: "Spider Application".to_string(),
            app_version: (1, 0, 0),
            descriptor_arena_capacity: DEFAULT_ARENA_CAPACITY,
            clear_color: [0.0, 0.2, 0.4, 1.0],
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
