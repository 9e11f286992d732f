/// Renderer module - the facade applications drive

pub mod renderer;

pub use renderer::{Renderer, RESOURCE_VIEW_ARENA, SAMPLER_ARENA};
