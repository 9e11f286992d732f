/*!
# Spider Engine

GPU resource and pipeline core of the Spider rendering engine.

This crate holds everything between an application's frame loop and a
graphics backend, expressed against the `GraphicsDevice` trait so that
backends (Vulkan today) plug in underneath without the core knowing them.

## Architecture

- **ArenaAllocator**: growable descriptor tables handing out stable slot references
- **ShaderReflector**: backend-specific shader introspection into a portable `ReflectionResult`
- **PipelineLayoutBuilder**: turns compiled shaders into a binding layout, a pipeline
  state and a populated `BindingRegistry`
- **FramePacer / FrameSequencer**: fence-paced ring of frames in flight
- **Renderer**: facade owning all of the above for one device

Logging goes through an injected `Console`; nothing in the crate is global.
*/

// Internal modules
mod config;
mod error;
pub mod log;
pub mod graphics_device;
pub mod shader;
pub mod descriptor;
pub mod pipeline;
pub mod frame;
pub mod scene;
pub mod renderer;

// Main spider namespace module
pub mod spider {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::{RendererConfig, DEFAULT_ARENA_CAPACITY};

    // Renderer facade
    pub use crate::renderer::{Renderer, RESOURCE_VIEW_ARENA, SAMPLER_ARENA};

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{format_entry, Console, DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Backend interface
    pub mod render {
        pub use crate::graphics_device::*;
    }

    pub mod shader {
        pub use crate::shader::*;
    }

    pub mod descriptor {
        pub use crate::descriptor::*;
    }

    pub mod pipeline {
        pub use crate::pipeline::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
