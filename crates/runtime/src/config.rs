//! Command-line configuration and its validated domain form.

use std::path::PathBuf;
use std::time::Duration;

use bench::StepBudgetSchedule;
use clap::{Parser, ValueEnum};
use render::RaySettings;
use volume::{VolumeSpec, MAX_SIDE};

use crate::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    /// wgpu when available, otherwise the CPU reference backend.
    Auto,
    Cpu,
    Gpu,
}

/// Headless voxel ray-march benchmark.
#[derive(Parser, Debug, Clone)]
#[command(name = "voxbench", version, about)]
pub struct RunConfig {
    /// Output width in pixels.
    #[arg(long, default_value_t = 640)]
    pub width: u32,
    /// Output height in pixels.
    #[arg(long, default_value_t = 360)]
    pub height: u32,
    /// Comma separated maxSteps values, tested in order.
    #[arg(long, default_value = "10,20,40,80,160,320")]
    pub schedule: StepBudgetSchedule,
    /// Seconds before the first stage boundary.
    #[arg(long, default_value_t = 5.0)]
    pub warmup_secs: f64,
    /// Fixed tick interval in seconds.
    #[arg(long, default_value_t = 0.02)]
    pub fixed_dt: f64,
    /// Side of the density volume in cells.
    #[arg(long, default_value_t = volume::DEFAULT_SIDE)]
    pub volume_size: u32,
    /// Multiplier applied to cell coordinates before sampling noise.
    #[arg(long, default_value_t = 1.0)]
    pub noise_scale: f32,
    /// Multiplier applied to the noise value.
    #[arg(long, default_value_t = 1.0)]
    pub height_scale: f32,
    /// Noise permutation seed.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Ray step length in cells.
    #[arg(long, default_value_t = 0.5)]
    pub step_size: f32,
    /// Densities above this value are surfaces.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub threshold: f32,
    /// Equirectangular sky image (PNG). A gradient is used when omitted.
    #[arg(long)]
    pub skybox: Option<PathBuf>,
    /// Surface colour image (PNG). A checkerboard is used when omitted.
    #[arg(long)]
    pub surface: Option<PathBuf>,
    /// Directory to save the last presented frame into.
    #[arg(long)]
    pub capture: Option<PathBuf>,
    /// Seconds to keep rendering after the last stage starts.
    #[arg(long, default_value_t = 1.0)]
    pub linger_secs: f64,
    /// Hard limit on the run length in seconds.
    #[arg(long)]
    pub max_secs: Option<f64>,
    #[arg(long, value_enum, default_value_t = BackendChoice::Auto)]
    pub backend: BackendChoice,
    /// Camera orbit speed in radians per second.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub orbit_speed: f32,
}

fn seconds(name: &str, value: f64) -> Result<Duration, SessionError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| SessionError::InvalidConfig(format!("{name} must be a non-negative number of seconds")))
}

impl RunConfig {
    /// # Errors
    ///
    /// `SessionError::InvalidConfig` for out-of-range values.
    pub fn session_config(&self) -> Result<SessionConfig, SessionError> {
        let config = SessionConfig {
            volume: VolumeSpec {
                size: self.volume_size,
                noise_scale: self.noise_scale,
                height_scale: self.height_scale,
                seed: self.seed,
            },
            ray: RaySettings { step_size: self.step_size, threshold: self.threshold },
            schedule: self.schedule.clone(),
            warmup: seconds("--warmup-secs", self.warmup_secs)?,
            orbit_speed: self.orbit_speed,
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `SessionError::InvalidConfig` for out-of-range values.
    pub fn host_options(&self) -> Result<crate::host::HostOptions, SessionError> {
        if self.width == 0 || self.height == 0 {
            return Err(SessionError::InvalidConfig("output size must be non-zero".into()));
        }
        let fixed_dt = seconds("--fixed-dt", self.fixed_dt)?;
        if fixed_dt.is_zero() {
            return Err(SessionError::InvalidConfig("--fixed-dt must be positive".into()));
        }
        Ok(crate::host::HostOptions {
            width: self.width,
            height: self.height,
            fixed_dt,
            linger: seconds("--linger-secs", self.linger_secs)?,
            max_run: self.max_secs.map(|s| seconds("--max-secs", s)).transpose()?,
            capture_dir: self.capture.clone(),
        })
    }
}

/// Everything a [`crate::Session`] needs, checked once at construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub volume: VolumeSpec,
    pub ray: RaySettings,
    pub schedule: StepBudgetSchedule,
    pub warmup: Duration,
    pub orbit_speed: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            volume: VolumeSpec::default(),
            ray: RaySettings::default(),
            schedule: StepBudgetSchedule::default(),
            warmup: bench::DEFAULT_WARMUP,
            orbit_speed: 0.0,
        }
    }
}

impl SessionConfig {
    /// # Errors
    ///
    /// `SessionError::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<(), SessionError> {
        let invalid = |msg: &str| Err(SessionError::InvalidConfig(msg.to_string()));
        if self.volume.size == 0 || self.volume.size > MAX_SIDE {
            return invalid("volume size must be between 1 and 1024");
        }
        if !self.volume.noise_scale.is_finite() || !self.volume.height_scale.is_finite() {
            return invalid("noise and height scales must be finite");
        }
        if !(self.ray.step_size.is_finite() && self.ray.step_size > 0.0) {
            return invalid("step size must be positive");
        }
        if !self.ray.threshold.is_finite() {
            return invalid("threshold must be finite");
        }
        if !self.orbit_speed.is_finite() {
            return invalid("orbit speed must be finite");
        }
        Ok(())
    }
}
