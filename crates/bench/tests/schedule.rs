use std::time::Duration;

use bench::{BenchmarkController, Phase, StageReport, StepBudgetSchedule};

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn controller(budgets: &[u32]) -> BenchmarkController {
    BenchmarkController::new(StepBudgetSchedule::new(budgets.to_vec()).unwrap())
}

#[test]
fn walks_two_eight_thirty_two() {
    let mut bench = controller(&[2, 8, 32]);
    assert_eq!(bench.phase(), Phase::Running { stage: 0 });
    assert_eq!(bench.max_steps(), 2);

    // Ticks every 20 ms up to just before the warm-up ends.
    let mut t = 0.0;
    while t < 4.99 {
        bench.record_frame();
        assert_eq!(bench.on_fixed_tick(secs(t)), None);
        t += 0.02;
    }
    assert_eq!(bench.max_steps(), 2);

    let frames = bench.frames();
    let first = bench.on_fixed_tick(secs(5.0)).unwrap();
    assert_eq!(first, StageReport { stage: 1, frames, max_steps: 2 });
    assert!(first.to_string().starts_with("Test 1: "));
    assert_eq!(bench.phase(), Phase::Running { stage: 1 });
    assert_eq!(bench.max_steps(), 8);
    assert_eq!(bench.frames(), 0);

    for _ in 0..30 {
        bench.record_frame();
    }
    assert_eq!(bench.on_fixed_tick(secs(5.5)), None);
    let second = bench.on_fixed_tick(secs(6.0)).unwrap();
    assert_eq!(second, StageReport { stage: 2, frames: 30, max_steps: 8 });
    assert!(second.to_string().starts_with("Test 2: 30 frames"));

    assert_eq!(bench.phase(), Phase::Done);
    assert_eq!(bench.max_steps(), 32);
    assert_eq!(bench.on_fixed_tick(secs(100.0)), None);
    assert_eq!(bench.max_steps(), 32);
    assert_eq!(bench.reports().len(), 2);
}

#[test]
fn one_transition_per_tick() {
    let mut bench = controller(&[1, 2, 3, 4]);
    // Well past every boundary: each tick still advances a single stage.
    assert_eq!(bench.on_fixed_tick(secs(30.0)).map(|r| r.stage), Some(1));
    assert_eq!(bench.on_fixed_tick(secs(30.0)).map(|r| r.stage), Some(2));
    assert_eq!(bench.on_fixed_tick(secs(30.0)).map(|r| r.stage), Some(3));
    assert_eq!(bench.on_fixed_tick(secs(30.0)), None);
    assert_eq!(bench.max_steps(), 4);
}

#[test]
fn empty_stage_reports_sentinel() {
    let mut bench = controller(&[5, 10, 15]);
    bench.on_fixed_tick(secs(5.0)).unwrap();
    let report = bench.on_fixed_tick(secs(6.0)).unwrap();
    assert_eq!(report.frames, 0);
    assert_eq!(report.average_frame_time(), None);
    let line = report.to_string();
    assert!(line.ends_with("insufficient samples"));
    assert!(!line.contains("inf") && !line.contains("NaN"));
}

#[test]
fn custom_warmup_moves_the_first_boundary() {
    let schedule = StepBudgetSchedule::new(vec![4, 8]).unwrap();
    let mut bench = BenchmarkController::with_warmup(schedule, Duration::ZERO);
    bench.record_frame();
    let report = bench.on_fixed_tick(Duration::ZERO).unwrap();
    assert_eq!(report.frames, 1);
    assert_eq!(report.average_frame_time(), Some(1.0));
    assert_eq!(bench.phase(), Phase::Done);
}
