#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! Per-frame ray-march pipeline.
//!
//! [`FrameRenderer`] owns the uploaded density volume and an off-screen
//! storage target. Each frame it dispatches the ray-march kernel with the
//! staged [`FrameParameters`] and copies the result into the caller's
//! destination texture.

pub mod camera;
pub mod capture;
pub mod error;
pub mod renderer;

pub use camera::{Camera, CameraState};
pub use error::RenderError;
pub use renderer::{
    dispatch_grid, FrameOutcome, FrameParameters, FrameRenderer, RaySettings, TargetStatus,
};
