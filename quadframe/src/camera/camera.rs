/// QuadCamera - left-handed look-at camera with a perspective projection.
///
/// Produces the world-view-projection constant the vertex stage reads from
/// register b0. Matrices are glam column-major; the combined matrix is
/// `projection * view * world`, which has the same memory layout as the
/// row-major `world * view * projection` a DirectX-style shader multiplies
/// with `mul(position, matrix)`.

use glam::{Mat4, Vec3};

/// Camera looking at the quad
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadCamera {
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
    world: Mat4,
}

impl QuadCamera {
    /// Default eye position, five units in front of the quad
    pub const DEFAULT_EYE: Vec3 = Vec3::new(0.0, 0.0, -5.0);
    pub const DEFAULT_FOV_Y: f32 = std::f32::consts::FRAC_PI_2;
    pub const DEFAULT_NEAR: f32 = 1.0;
    pub const DEFAULT_FAR: f32 = 10.0;

    /// Camera at `DEFAULT_EYE` looking at the origin, +Y up, sized for a
    /// `width` x `height` surface
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            eye: Self::DEFAULT_EYE,
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: Self::DEFAULT_FOV_Y,
            aspect: width as f32 / height.max(1) as f32,
            near: Self::DEFAULT_NEAR,
            far: Self::DEFAULT_FAR,
            world: Mat4::IDENTITY,
        }
    }

    // ===== GETTERS =====

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Left-handed look-at view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_lh(self.eye, self.target, self.up)
    }

    /// Left-handed perspective projection, depth mapped to [0, 1]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    /// Combined world-view-projection matrix uploaded as the constant buffer
    pub fn world_view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix() * self.world
    }

    // ===== SETTERS =====

    pub fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
    }

    pub fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }

    /// Update the aspect ratio for a new surface size
    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
