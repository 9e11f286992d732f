/// Camera - left-handed perspective camera driven by a transform
///
/// The camera looks along the +Z axis of its transform. Projection maps
/// depth to [0, 1].

use glam::{Mat4, Quat, Vec3};

use super::transform::Transform;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub transform: Transform,
    pub up: Vec3,
    width: u32,
    height: u32,
    fov_y: f32,
    near: f32,
    far: f32,
}

impl Camera {
    pub const DEFAULT_FOV_Y: f32 = std::f32::consts::FRAC_PI_4;
    pub const DEFAULT_NEAR: f32 = 0.01;
    pub const DEFAULT_FAR: f32 = 1000.0;

    /// Camera for a viewport of `width` x `height` pixels
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            transform: Transform::default(),
            up: Vec3::Y,
            width: width.max(1),
            height: height.max(1),
            fov_y: Self::DEFAULT_FOV_Y,
            near: Self::DEFAULT_NEAR,
            far: Self::DEFAULT_FAR,
        }
    }

    // ===== Projection parameters =====

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    pub fn set_fov(&mut self, fov_y: f32) {
        self.fov_y = fov_y;
    }

    pub fn set_clipping_planes(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
    }

    pub fn fov(&self) -> f32 {
        self.fov_y
    }

    pub fn clipping_planes(&self) -> (f32, f32) {
        (self.near, self.far)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    // ===== Orientation =====

    /// Rotate the camera so it looks at `target`
    pub fn look_at(&mut self, target: Vec3) {
        let direction = target - self.transform.position;
        if direction.length_squared() > f32::EPSILON {
            self.transform.rotation = Quat::from_rotation_arc(Vec3::Z, direction.normalize());
        }
    }

    // ===== Matrices =====

    pub fn view(&self) -> Mat4 {
        let position = self.transform.position;
        Mat4::look_at_lh(position, position + self.transform.forward(), self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov_y, self.aspect_ratio(), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
