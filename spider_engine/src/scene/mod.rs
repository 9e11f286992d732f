//! Scene input types
//!
//! The renderer does not own a scene. Callers keep their cameras and
//! drawables and hand them to `draw` every frame.

mod camera;
mod transform;
mod vertex;
mod drawable;

pub use camera::Camera;
pub use transform::Transform;
pub use vertex::{FrameData, Vertex};
pub use drawable::{Drawable, MeshBuffers};
