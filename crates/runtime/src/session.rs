use std::sync::Arc;
use std::time::Duration;

use bench::{BenchmarkController, Phase, StageReport};
use compute::{ComputeBackend, ResourceHandle};
use render::{Camera, FrameOutcome, FrameParameters, FrameRenderer, RenderError};
use thiserror::Error;
use volume::{DensityVolume, VolumeError};

use crate::{Clock, SessionConfig};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Volume(#[from] VolumeError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Host-owned texture each frame is presented into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSurface {
    pub texture: ResourceHandle,
    pub width: u32,
    pub height: u32,
}

/// Read-only input textures supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTextures {
    pub skybox: ResourceHandle,
    pub surface: ResourceHandle,
}

impl SceneTextures {
    pub fn release(self, backend: &dyn ComputeBackend) {
        for handle in [self.skybox, self.surface] {
            if let Err(e) = backend.release(handle) {
                tracing::warn!(?handle, "failed to release scene texture: {e}");
            }
        }
    }
}

/// One benchmark run: the renderer, the controller and the camera, advanced
/// by the host through [`Session::on_frame`] and [`Session::on_fixed_tick`].
pub struct Session<C: Clock> {
    renderer: FrameRenderer,
    controller: BenchmarkController,
    camera: Camera,
    textures: SceneTextures,
    clock: C,
    orbit_speed: f32,
    last_frame: Option<Duration>,
}

impl<C: Clock> Session<C> {
    /// Generates the volume and prepares the renderer. The clock's zero is
    /// the start of the benchmark.
    ///
    /// # Errors
    ///
    /// Configuration and volume errors, or the backend failing to take the
    /// volume upload.
    pub fn new(
        backend: Arc<dyn ComputeBackend>,
        config: SessionConfig,
        textures: SceneTextures,
        clock: C,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let volume = DensityVolume::generate(&config.volume)?;
        let camera = Camera::overlooking(volume.side());
        let renderer = FrameRenderer::new(backend, volume, config.ray)?;
        let controller = BenchmarkController::with_warmup(config.schedule, config.warmup);

        Ok(Self {
            renderer,
            controller,
            camera,
            textures,
            clock,
            orbit_speed: config.orbit_speed,
            last_frame: None,
        })
    }

    /// Stages this frame's parameters and renders into `surface`.
    ///
    /// # Errors
    ///
    /// Rendering errors; the frame is not counted.
    pub fn on_frame(&mut self, surface: &OutputSurface) -> Result<FrameOutcome, SessionError> {
        let now = self.clock.now();
        if let Some(last) = self.last_frame {
            #[allow(clippy::cast_possible_truncation)]
            let dt = now.saturating_sub(last).as_secs_f64() as f32;
            if self.orbit_speed.abs() > f32::EPSILON {
                self.camera.orbit(self.orbit_speed * dt);
            }
        }
        self.last_frame = Some(now);

        let state = self.camera.state(surface.width, surface.height);
        self.renderer.set_parameters(FrameParameters {
            max_steps: self.controller.max_steps(),
            skybox: Some(self.textures.skybox),
            surface: Some(self.textures.surface),
            volume: Some(self.renderer.volume_handle()),
            camera_to_world: state.camera_to_world,
            inverse_projection: state.inverse_projection,
        });

        let outcome = self.renderer.render_frame(surface.texture, surface.width, surface.height)?;
        if matches!(outcome, FrameOutcome::Presented { .. }) {
            self.controller.record_frame();
        }
        Ok(outcome)
    }

    /// Lets the controller advance its schedule.
    pub fn on_fixed_tick(&mut self) -> Option<StageReport> {
        self.controller.on_fixed_tick(self.clock.now())
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.controller.phase() == Phase::Done
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    #[must_use]
    pub fn controller(&self) -> &BenchmarkController {
        &self.controller
    }

    #[must_use]
    pub fn renderer(&self) -> &FrameRenderer {
        &self.renderer
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }
}
