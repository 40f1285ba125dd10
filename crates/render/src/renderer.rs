use std::sync::Arc;

use compute::layout::workgroups_for;
use compute::{
    Binding, BufferView, ComputeBackend, Kernel, RayMarchParams, ResourceHandle, TextureDesc,
    TextureFormat, TextureUsage,
};
use glam::Mat4;
use volume::DensityVolume;

use crate::RenderError;

/// Ray stepping constants fixed for the lifetime of a renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySettings {
    /// Distance advanced per step, in voxels.
    pub step_size: f32,
    /// Densities strictly above this count as a surface.
    pub threshold: f32,
}

impl Default for RaySettings {
    fn default() -> Self {
        Self { step_size: 0.5, threshold: 0.0 }
    }
}

/// Everything one dispatch reads, staged by the caller before each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParameters {
    pub max_steps: u32,
    pub skybox: Option<ResourceHandle>,
    pub surface: Option<ResourceHandle>,
    pub volume: Option<ResourceHandle>,
    pub camera_to_world: Mat4,
    pub inverse_projection: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    /// The existing target already has the requested size.
    Unchanged,
    /// A new target was allocated, replacing the old one if there was one.
    Allocated,
    /// One of the dimensions is zero; nothing was allocated.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { workgroups: [u32; 3] },
    Skipped,
}

#[derive(Debug, Clone, Copy)]
struct RenderTarget {
    handle: ResourceHandle,
    width: u32,
    height: u32,
}

/// Work-group grid covering a `width x height` target.
#[must_use]
pub const fn dispatch_grid(width: u32, height: u32) -> [u32; 3] {
    workgroups_for(width, height)
}

pub struct FrameRenderer {
    backend: Arc<dyn ComputeBackend>,
    volume: DensityVolume,
    volume_handle: ResourceHandle,
    settings: RaySettings,
    target: Option<RenderTarget>,
    staged: Option<FrameParameters>,
    frames_presented: u64,
}

impl FrameRenderer {
    /// Uploads `volume` and takes ownership of it for the session.
    ///
    /// # Errors
    ///
    /// Propagates the backend's error if the volume texture cannot be created.
    pub fn new(
        backend: Arc<dyn ComputeBackend>,
        volume: DensityVolume,
        settings: RaySettings,
    ) -> Result<Self, RenderError> {
        let desc = TextureDesc::volume("density volume", volume.side());
        let volume_handle = backend.create_texture(&desc, Some(volume.as_slice()))?;
        tracing::info!(side = volume.side(), backend = backend.name(), "uploaded density volume");

        Ok(Self {
            backend,
            volume,
            volume_handle,
            settings,
            target: None,
            staged: None,
            frames_presented: 0,
        })
    }

    /// Handle of the uploaded density volume, for staging.
    #[must_use]
    pub fn volume_handle(&self) -> ResourceHandle {
        self.volume_handle
    }

    #[must_use]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Handle and size of the current render target, if any.
    #[must_use]
    pub fn target(&self) -> Option<(ResourceHandle, u32, u32)> {
        self.target.map(|t| (t.handle, t.width, t.height))
    }

    /// Makes sure a storage target of `width x height` exists.
    ///
    /// # Errors
    ///
    /// `RenderError::TargetAllocation` if the new target cannot be created,
    /// `RenderError::Compute` if the old one cannot be released.
    pub fn ensure_target(&mut self, width: u32, height: u32) -> Result<TargetStatus, RenderError> {
        if width == 0 || height == 0 {
            return Ok(TargetStatus::Skipped);
        }
        if let Some(target) = self.target {
            if target.width == width && target.height == height {
                return Ok(TargetStatus::Unchanged);
            }
            self.target = None;
            self.backend.release(target.handle)?;
        }

        let desc = TextureDesc::image_2d(
            "ray march target",
            width,
            height,
            TextureFormat::Rgba32Float,
            TextureUsage::Storage,
        );
        let handle = self
            .backend
            .create_texture(&desc, None)
            .map_err(|source| RenderError::TargetAllocation { width, height, source })?;
        self.target = Some(RenderTarget { handle, width, height });
        tracing::debug!(width, height, "allocated render target");
        Ok(TargetStatus::Allocated)
    }

    /// Stages the parameters of the next frames. No work is done on the
    /// backend.
    pub fn set_parameters(&mut self, parameters: FrameParameters) {
        self.staged = Some(parameters);
    }

    /// Ray-marches one frame and copies it into `destination`.
    ///
    /// # Errors
    ///
    /// Configuration errors (nothing staged, missing or released textures)
    /// are reported before any backend work. Backend failures propagate.
    pub fn render_frame(
        &mut self,
        destination: ResourceHandle,
        width: u32,
        height: u32,
    ) -> Result<FrameOutcome, RenderError> {
        let staged = self.staged.ok_or(RenderError::ParametersNotStaged)?;
        let skybox = self.resolve(staged.skybox, "skybox")?;
        let surface = self.resolve(staged.surface, "surface")?;
        let volume = self.resolve(staged.volume, "volume")?;

        if self.ensure_target(width, height)? == TargetStatus::Skipped {
            tracing::debug!(width, height, "zero-sized frame skipped");
            return Ok(FrameOutcome::Skipped);
        }
        let Some(target) = self.target else {
            return Ok(FrameOutcome::Skipped);
        };

        let params = RayMarchParams {
            camera_to_world: staged.camera_to_world.to_cols_array_2d(),
            inverse_projection: staged.inverse_projection.to_cols_array_2d(),
            max_steps: staged.max_steps,
            step_size: self.settings.step_size,
            threshold: self.settings.threshold,
            volume_side: self.volume.side(),
            output_size: [width, height],
            _pad: [0, 0],
        };
        let binds = [
            Binding::Uniform(BufferView::from_pod(&params)),
            Binding::Texture(volume),
            Binding::Texture(skybox),
            Binding::Texture(surface),
            Binding::StorageTexture(target.handle),
        ];
        let workgroups = dispatch_grid(width, height);

        self.backend.dispatch(&Kernel::RayMarch, &binds, workgroups)?;
        self.backend.copy_texture(target.handle, destination)?;
        self.frames_presented += 1;
        Ok(FrameOutcome::Presented { workgroups })
    }

    fn resolve(
        &self,
        handle: Option<ResourceHandle>,
        what: &'static str,
    ) -> Result<ResourceHandle, RenderError> {
        handle
            .filter(|h| self.backend.describe(*h).is_some())
            .ok_or(RenderError::MissingTexture(what))
    }
}

impl Drop for FrameRenderer {
    fn drop(&mut self) {
        let handles = self.target.take().map(|t| t.handle).into_iter().chain([self.volume_handle]);
        for handle in handles {
            if let Err(e) = self.backend.release(handle) {
                tracing::warn!(?handle, "failed to release texture: {e}");
            }
        }
    }
}
