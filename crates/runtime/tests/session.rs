use std::sync::Arc;
use std::time::Duration;

use bench::StepBudgetSchedule;
use clap::Parser;
use compute::{ComputeBackend, MockCpu, TextureDesc, TextureFormat, TextureUsage};
use render::FrameOutcome;
use runtime::{
    assets, run_headless, run_on, Clock, HostOptions, ManualClock, OutputSurface, RunConfig, Session,
    SessionConfig, SessionError,
};
use volume::VolumeSpec;

fn small_config(budgets: &[u32]) -> SessionConfig {
    SessionConfig {
        volume: VolumeSpec::with_size(8),
        schedule: StepBudgetSchedule::new(budgets.to_vec()).unwrap(),
        ..SessionConfig::default()
    }
}

fn setup(budgets: &[u32]) -> (Arc<MockCpu>, Session<ManualClock>, OutputSurface) {
    let cpu = Arc::new(MockCpu::new());
    let backend: Arc<dyn ComputeBackend> = cpu.clone();
    let textures = assets::upload_scene_textures(cpu.as_ref(), None, None).unwrap();
    let session = Session::new(backend, small_config(budgets), textures, ManualClock::default()).unwrap();
    let desc = TextureDesc::image_2d("screen", 16, 8, TextureFormat::Rgba32Float, TextureUsage::Destination);
    let texture = cpu.create_texture(&desc, None).unwrap();
    (cpu, session, OutputSurface { texture, width: 16, height: 8 })
}

#[test]
fn frames_use_the_controllers_budget() {
    let (cpu, mut session, surface) = setup(&[2, 8, 32]);

    session.on_frame(&surface).unwrap();
    assert_eq!(cpu.last_dispatch().unwrap().params.unwrap().max_steps, 2);

    session.clock().set(Duration::from_secs(5));
    let report = session.on_fixed_tick().unwrap();
    assert_eq!((report.stage, report.frames, report.max_steps), (1, 1, 2));

    session.on_frame(&surface).unwrap();
    assert_eq!(cpu.last_dispatch().unwrap().params.unwrap().max_steps, 8);
    assert_eq!(session.controller().frames(), 1);
}

#[test]
fn full_schedule_reaches_done() {
    let (_cpu, mut session, surface) = setup(&[2, 8, 32]);
    for step in 0..400 {
        session.clock().set(Duration::from_millis(step * 20));
        session.on_fixed_tick();
        session.on_frame(&surface).unwrap();
    }
    assert!(session.is_done());
    let reports = session.controller().reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].max_steps, 2);
    assert_eq!(reports[1].max_steps, 8);
    // Frames rendered from 5.00 s up to 5.98 s belong to the second stage.
    assert_eq!(reports[1].frames, 50);
    assert_eq!(session.controller().max_steps(), 32);
}

#[test]
fn zero_sized_surface_is_not_counted() {
    let (cpu, mut session, surface) = setup(&[4, 8]);
    let empty = OutputSurface { width: 0, ..surface };
    assert_eq!(session.on_frame(&empty).unwrap(), FrameOutcome::Skipped);
    assert_eq!(session.controller().frames(), 0);
    assert_eq!(cpu.stats().dispatches, 0);
}

#[test]
fn released_scene_texture_fails_the_frame() {
    let cpu = Arc::new(MockCpu::new());
    let backend: Arc<dyn ComputeBackend> = cpu.clone();
    let textures = assets::upload_scene_textures(cpu.as_ref(), None, None).unwrap();
    let mut session = Session::new(backend, small_config(&[4, 8]), textures, ManualClock::default()).unwrap();
    let desc = TextureDesc::image_2d("screen", 8, 8, TextureFormat::Rgba32Float, TextureUsage::Destination);
    let surface = OutputSurface { texture: cpu.create_texture(&desc, None).unwrap(), width: 8, height: 8 };

    cpu.release(textures.skybox).unwrap();
    assert!(matches!(session.on_frame(&surface), Err(SessionError::Render(_))));
    assert_eq!(session.controller().frames(), 0);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let cpu = Arc::new(MockCpu::new());
    let textures = assets::upload_scene_textures(cpu.as_ref(), None, None).unwrap();
    let mut config = small_config(&[4]);
    config.ray.step_size = -1.0;
    let result = Session::new(cpu.clone(), config, textures, ManualClock::default());
    assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    // Only the two scene textures exist; no volume was uploaded.
    assert_eq!(cpu.live_textures(), 2);
}

#[test]
fn orbit_moves_the_camera_between_frames() {
    let cpu = Arc::new(MockCpu::new());
    let textures = assets::upload_scene_textures(cpu.as_ref(), None, None).unwrap();
    let config = SessionConfig { orbit_speed: 0.5, ..small_config(&[4, 8]) };
    let mut session = Session::new(cpu.clone(), config, textures, ManualClock::default()).unwrap();
    let desc = TextureDesc::image_2d("screen", 8, 8, TextureFormat::Rgba32Float, TextureUsage::Destination);
    let surface = OutputSurface { texture: cpu.create_texture(&desc, None).unwrap(), width: 8, height: 8 };

    session.on_frame(&surface).unwrap();
    let before = session.camera().eye;
    session.clock().advance(Duration::from_secs(1));
    session.on_frame(&surface).unwrap();
    assert!(session.camera().eye.distance(before) > 0.1);
}

/// Advances a fixed amount every time it is read, so a host loop driven by
/// it is deterministic and terminates.
#[derive(Default)]
struct SteppingClock {
    inner: ManualClock,
}

impl Clock for SteppingClock {
    fn now(&self) -> Duration {
        self.inner.advance(Duration::from_millis(10));
        self.inner.now()
    }
}

#[test]
fn headless_loop_runs_schedule_and_lingers() {
    let cpu = Arc::new(MockCpu::new());
    let textures = assets::upload_scene_textures(cpu.as_ref(), None, None).unwrap();
    let config = SessionConfig { warmup: Duration::ZERO, ..small_config(&[1, 2, 3]) };
    let mut session = Session::new(cpu.clone(), config, textures, SteppingClock::default()).unwrap();

    let options = HostOptions {
        width: 16,
        height: 8,
        linger: Duration::from_millis(200),
        max_run: Some(Duration::from_secs(30)),
        ..HostOptions::default()
    };
    let summary = run_headless(cpu.as_ref(), &mut session, &options).unwrap();

    assert!(session.is_done());
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.reports[0].max_steps, 1);
    assert_eq!(summary.reports[1].max_steps, 2);
    assert!(summary.frames > 0);
    assert_eq!(summary.frames, session.renderer().frames_presented());
    assert!(summary.fixed_ticks > 0);
    assert!(summary.capture.is_none());
    // Display texture released; scene textures, volume and target remain.
    assert_eq!(cpu.live_textures(), 4);
}

#[test]
fn headless_loop_writes_capture() {
    let cpu = Arc::new(MockCpu::new());
    let textures = assets::upload_scene_textures(cpu.as_ref(), None, None).unwrap();
    let config = SessionConfig { warmup: Duration::ZERO, ..small_config(&[1, 2]) };
    let mut session = Session::new(cpu.clone(), config, textures, SteppingClock::default()).unwrap();

    let dir = std::env::temp_dir().join(format!("voxbench-capture-{}", std::process::id()));
    let options = HostOptions {
        width: 8,
        height: 8,
        linger: Duration::ZERO,
        capture_dir: Some(dir.clone()),
        ..HostOptions::default()
    };
    let summary = run_headless(cpu.as_ref(), &mut session, &options).unwrap();

    let path = summary.capture.unwrap();
    assert!(path.starts_with(&dir));
    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (8, 8));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn failed_run_releases_every_texture() {
    // A regular file where the capture directory should go makes the run fail
    // after the loop has finished.
    let blocker = std::env::temp_dir().join(format!("voxbench-blocker-{}", std::process::id()));
    std::fs::write(&blocker, b"not a directory").unwrap();
    let config = RunConfig::parse_from([
        "voxbench",
        "--backend",
        "cpu",
        "--width",
        "8",
        "--height",
        "8",
        "--volume-size",
        "8",
        "--schedule",
        "1,2",
        "--warmup-secs",
        "0",
        "--linger-secs",
        "0",
        "--capture",
        blocker.to_str().unwrap(),
    ]);

    let cpu = Arc::new(MockCpu::new());
    assert!(run_on(cpu.clone(), &config).is_err());
    assert_eq!(cpu.live_textures(), 0);
    std::fs::remove_file(&blocker).unwrap();
}

#[test]
fn successful_run_releases_every_texture() {
    let config = RunConfig::parse_from([
        "voxbench", "--backend", "cpu", "--width", "8", "--height", "8", "--volume-size", "8", "--schedule",
        "1,2", "--warmup-secs", "0", "--linger-secs", "0",
    ]);
    let cpu = Arc::new(MockCpu::new());
    let summary = run_on(cpu.clone(), &config).unwrap();
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(cpu.live_textures(), 0);
}
