//! Error types for the Spider engine
//!
//! One error enum covers the device, resource, shader, binding and frame
//! lifecycle failures of the core and of every backend.

use std::fmt;

use crate::shader::ShaderStage;

/// Result type for Spider engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Spider engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The device was removed or reset. Terminal for the frame loop.
    DeviceLost(String),

    /// Unrecoverable backend-specific error (Vulkan, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource description or usage (buffer, texture, slot, ...)
    InvalidResource(String),

    /// Initialization failed (device, surface, subsystems)
    InitializationFailed(String),

    /// Shader compilation failed, carries the compiler diagnostic
    ShaderCompilation(String),

    /// Shader reflection failed, carries the introspection diagnostic
    ShaderReflection(String),

    /// No binding registered for this exact name and stage
    BindingNotFound {
        name: String,
        stage: ShaderStage,
    },

    /// A shader stage that cannot be used for a single module
    InvalidStage(String),

    /// Frame sequencing call made in the wrong phase
    FrameOrder(String),
}

impl Error {
    /// True for errors the caller may skip over without stopping the frame loop
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::BindingNotFound { .. })
    }

    /// True for errors that must abort the frame loop
    pub fn is_device_fatal(&self) -> bool {
        matches!(self, Error::DeviceLost(_) | Error::BackendError(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            Error::ShaderReflection(msg) => write!(f, "Shader reflection failed: {}", msg),
            Error::BindingNotFound { name, stage } => {
                write!(f, "Binding not found: '{}' ({:?} stage)", name, stage)
            }
            Error::InvalidStage(msg) => write!(f, "Invalid shader stage: {}", msg),
            Error::FrameOrder(msg) => write!(f, "Frame order violation: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
