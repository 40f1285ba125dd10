//! Camera and the per-frame matrices derived from it
//!
//! World space is z-up, matching the density volume's height axis.

use glam::{Mat4, Quat, Vec3};

/// Matrices the ray-march kernel needs to build a camera ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub camera_to_world: Mat4,
    pub inverse_projection: Mat4,
}

impl CameraState {
    /// Builds the state from a camera-to-world transform and a projection.
    /// The projection is inverted here.
    #[must_use]
    pub fn new(camera_to_world: Mat4, projection: Mat4) -> Self {
        Self { camera_to_world, inverse_projection: projection.inverse() }
    }
}

/// Perspective camera looking at a fixed target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Camera position
    pub eye: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// Up vector
    pub up: Vec3,
    /// Field of view in radians
    pub fovy: f32,
    /// Near clipping plane distance
    pub znear: f32,
    /// Far clipping plane distance
    pub zfar: f32,
}

impl Camera {
    #[must_use]
    pub fn new(eye: Vec3, target: Vec3) -> Self {
        Self {
            eye,
            target,
            up: Vec3::Z,
            fovy: 60.0f32.to_radians(),
            znear: 0.1,
            zfar: 1000.0,
        }
    }

    /// Viewpoint outside one corner of a volume of `side` cells, looking at
    /// the middle of its floor.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn overlooking(side: u32) -> Self {
        let n = side.max(1) as f32;
        Self::new(Vec3::new(-0.25 * n, -0.25 * n, 0.75 * n), Vec3::new(0.5 * n, 0.5 * n, 0.0))
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    #[must_use]
    pub fn camera_to_world(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    #[must_use]
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fovy, aspect, self.znear, self.zfar)
    }

    /// Matrices for a `width x height` output. Degenerate sizes use a square
    /// aspect.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn state(&self, width: u32, height: u32) -> CameraState {
        let aspect = if width == 0 || height == 0 { 1.0 } else { width as f32 / height as f32 };
        CameraState::new(self.camera_to_world(), self.projection(aspect))
    }

    /// Rotates the eye around the target about the up axis.
    pub fn orbit(&mut self, angle: f32) {
        let offset = self.eye - self.target;
        self.eye = self.target + Quat::from_axis_angle(self.up, angle) * offset;
    }
}
