#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Benchmark runtime
//!
//! Ties the volume, the renderer and the benchmark controller together.
//! A [`Session`] exposes the two calls a host makes: [`Session::on_frame`]
//! once per presented frame and [`Session::on_fixed_tick`] on a fixed
//! interval. [`host`] provides a headless host that drives a session against
//! an off-screen display texture.

pub mod assets;
pub mod clock;
pub mod config;
pub mod host;
pub mod session;

pub use clock::{Clock, ManualClock, WallClock};
pub use config::{BackendChoice, RunConfig, SessionConfig};
pub use host::{run_headless, HostOptions, RunSummary};
pub use session::{OutputSurface, SceneTextures, Session, SessionError};

use std::sync::Arc;

use anyhow::{Context, Result};
use compute::{ComputeBackend, MockCpu};

/// Creates the backend selected on the command line.
///
/// # Errors
///
/// Fails when the GPU is requested but unavailable or not compiled in.
pub fn select_backend(choice: BackendChoice) -> Result<Arc<dyn ComputeBackend>> {
    match choice {
        BackendChoice::Auto => Ok(compute::default_backend()),
        BackendChoice::Cpu => Ok(Arc::new(MockCpu::new())),
        #[cfg(feature = "gpu")]
        BackendChoice::Gpu => {
            let gpu = compute::WgpuBackend::try_new().context("no usable GPU adapter")?;
            Ok(Arc::new(gpu))
        }
        #[cfg(not(feature = "gpu"))]
        BackendChoice::Gpu => anyhow::bail!("voxbench was built without the `gpu` feature"),
    }
}

/// Runs a full benchmark as configured on the command line.
///
/// # Errors
///
/// Returns configuration, asset, and rendering errors with context.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    let backend = select_backend(config.backend)?;
    tracing::info!(backend = backend.name(), "compute backend selected");
    run_on(backend, config)
}

/// Runs a full benchmark on an already created backend. Every texture the
/// run creates is released before returning, whether or not it succeeds.
///
/// # Errors
///
/// Returns configuration, asset, and rendering errors with context.
pub fn run_on(backend: Arc<dyn ComputeBackend>, config: &RunConfig) -> Result<RunSummary> {
    let session_config = config.session_config().context("invalid configuration")?;
    let options = config.host_options().context("invalid configuration")?;

    let textures =
        assets::upload_scene_textures(backend.as_ref(), config.skybox.as_deref(), config.surface.as_deref())?;
    let result = Session::new(Arc::clone(&backend), session_config, textures, WallClock::new())
        .context("failed to start session")
        .and_then(|mut session| run_headless(backend.as_ref(), &mut session, &options));
    textures.release(backend.as_ref());
    result
}
