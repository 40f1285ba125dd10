//! Uniform blocks shared between the host and the kernels.
//!
//! Layouts here must match the structs declared in `shaders/ray_march.wgsl`.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Per-dispatch parameters of [`crate::Kernel::RayMarch`].
///
/// WGSL layout (160 bytes):
/// ```wgsl
/// struct Params {
///     camera_to_world: mat4x4<f32>,     // 0
///     inverse_projection: mat4x4<f32>,  // 64
///     max_steps: u32,                   // 128
///     step_size: f32,                   // 132
///     threshold: f32,                   // 136
///     volume_side: u32,                 // 140
///     output_size: vec2<u32>,           // 144
///     _pad: vec2<u32>,                  // 152
/// }
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RayMarchParams {
    pub camera_to_world: [[f32; 4]; 4],
    pub inverse_projection: [[f32; 4]; 4],
    pub max_steps: u32,
    pub step_size: f32,
    pub threshold: f32,
    pub volume_side: u32,
    pub output_size: [u32; 2],
    pub _pad: [u32; 2],
}

impl RayMarchParams {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    #[must_use]
    pub fn camera_to_world(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.camera_to_world)
    }

    #[must_use]
    pub fn inverse_projection(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.inverse_projection)
    }

    /// Decodes a uniform block from possibly unaligned bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        (bytes.len() == Self::SIZE).then(|| bytemuck::pod_read_unaligned(bytes))
    }
}

impl Default for RayMarchParams {
    fn default() -> Self {
        Self {
            camera_to_world: Mat4::IDENTITY.to_cols_array_2d(),
            inverse_projection: Mat4::IDENTITY.to_cols_array_2d(),
            max_steps: 0,
            step_size: 1.0,
            threshold: 0.0,
            volume_side: 0,
            output_size: [0, 0],
            _pad: [0, 0],
        }
    }
}
