//! Headless host loop.
//!
//! Plays the role of an engine's frame loop: every iteration runs all due
//! fixed ticks and then renders one frame into an off-screen display texture.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bench::StageReport;
use compute::{ComputeBackend, TextureDesc, TextureFormat, TextureUsage};
use render::{capture, FrameOutcome};

use crate::{Clock, OutputSurface, Session};

#[derive(Debug, Clone)]
pub struct HostOptions {
    pub width: u32,
    pub height: u32,
    /// Interval between fixed ticks.
    pub fixed_dt: Duration,
    /// How long to keep rendering once the schedule is done.
    pub linger: Duration,
    /// Stop after this long even if the schedule has not finished.
    pub max_run: Option<Duration>,
    /// Save the last presented frame here.
    pub capture_dir: Option<PathBuf>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            fixed_dt: Duration::from_millis(20),
            linger: Duration::from_secs(1),
            max_run: None,
            capture_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub fixed_ticks: u64,
    pub reports: Vec<StageReport>,
    pub capture: Option<PathBuf>,
}

/// Drives `session` until its schedule is done and the linger time has
/// passed, or until `max_run` elapses.
///
/// # Errors
///
/// Fails if the display texture cannot be created, a frame fails to render,
/// or the capture cannot be written.
pub fn run_headless<C: Clock>(
    backend: &dyn ComputeBackend,
    session: &mut Session<C>,
    options: &HostOptions,
) -> Result<RunSummary> {
    let desc = TextureDesc::image_2d(
        "display surface",
        options.width,
        options.height,
        TextureFormat::Rgba32Float,
        TextureUsage::Destination,
    );
    let display = backend.create_texture(&desc, None).context("failed to create display texture")?;
    let surface = OutputSurface { texture: display, width: options.width, height: options.height };

    let result = drive(session, &surface, options);
    let capture = match (&result, &options.capture_dir) {
        (Ok(_), Some(dir)) => Some(save_capture(backend, &surface, dir)),
        _ => None,
    };
    if let Err(e) = backend.release(display) {
        tracing::warn!("failed to release display texture: {e}");
    }

    let (frames, fixed_ticks) = result?;
    let capture = capture.transpose()?;
    Ok(RunSummary {
        frames,
        fixed_ticks,
        reports: session.controller().reports().to_vec(),
        capture,
    })
}

fn drive<C: Clock>(
    session: &mut Session<C>,
    surface: &OutputSurface,
    options: &HostOptions,
) -> Result<(u64, u64)> {
    let mut frames = 0u64;
    let mut fixed_ticks = 0u64;
    let mut accumulator = Duration::ZERO;
    let mut last = session.now();
    let mut done_at: Option<Duration> = None;

    tracing::info!(width = surface.width, height = surface.height, "headless loop started");
    loop {
        let now = session.now();
        accumulator += now.saturating_sub(last);
        last = now;
        while accumulator >= options.fixed_dt {
            accumulator -= options.fixed_dt;
            fixed_ticks += 1;
            session.on_fixed_tick();
        }

        if let FrameOutcome::Presented { .. } = session.on_frame(surface).context("frame failed")? {
            frames += 1;
        }

        if session.is_done() {
            let since = *done_at.get_or_insert(now);
            if now.saturating_sub(since) >= options.linger {
                break;
            }
        }
        if let Some(limit) = options.max_run {
            if now >= limit {
                tracing::warn!(?limit, stage = session.controller().stage(), "run time limit reached");
                break;
            }
        }
    }
    tracing::info!(frames, fixed_ticks, "headless loop finished");
    Ok((frames, fixed_ticks))
}

fn save_capture(backend: &dyn ComputeBackend, surface: &OutputSurface, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = capture::timestamped_path(dir, "voxbench");
    capture::save_png(backend, surface.texture, &path).context("failed to save capture")?;
    Ok(path)
}
