use std::fmt;
use std::time::Duration;

use crate::StepBudgetSchedule;

/// Time before the first stage boundary.
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(5);
/// Length of every stage after the first.
pub const STAGE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running { stage: usize },
    /// The last budget is active and stays active.
    Done,
}

/// Throughput of one completed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    /// 1-based number of the stage that just ended.
    pub stage: usize,
    pub frames: u64,
    pub max_steps: u32,
}

impl StageReport {
    /// Seconds per frame over the one-second window, or `None` if no frame
    /// was counted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_frame_time(&self) -> Option<f64> {
        (self.frames > 0).then(|| 1.0 / self.frames as f64)
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Test {}: {} frames counted in one second at maxSteps={} average frame render time: ",
            self.stage, self.frames, self.max_steps
        )?;
        match self.average_frame_time() {
            Some(avg) => write!(f, "{avg:.4}"),
            None => f.write_str("insufficient samples"),
        }
    }
}

/// Drives the step budget through its schedule.
///
/// `on_fixed_tick` is called on the host's fixed interval with the time since
/// the run started; `record_frame` once per presented frame. Both happen
/// between frames, so the budget read by the renderer never changes mid-frame.
#[derive(Debug)]
pub struct BenchmarkController {
    schedule: StepBudgetSchedule,
    warmup: Duration,
    stage: usize,
    frames: u64,
    max_steps: u32,
    reports: Vec<StageReport>,
}

impl BenchmarkController {
    #[must_use]
    pub fn new(schedule: StepBudgetSchedule) -> Self {
        Self::with_warmup(schedule, DEFAULT_WARMUP)
    }

    #[must_use]
    pub fn with_warmup(schedule: StepBudgetSchedule, warmup: Duration) -> Self {
        let max_steps = schedule.first();
        tracing::info!(stages = schedule.len(), max_steps, ?warmup, "benchmark started");
        Self {
            schedule,
            warmup,
            stage: 0,
            frames: 0,
            max_steps,
            reports: Vec::new(),
        }
    }

    /// The budget the renderer should use for the next frame.
    #[must_use]
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.stage >= self.schedule.last_stage() {
            Phase::Done
        } else {
            Phase::Running { stage: self.stage }
        }
    }

    #[must_use]
    pub fn stage(&self) -> usize {
        self.stage
    }

    /// Frames counted in the current stage.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Completed stages, oldest first.
    #[must_use]
    pub fn reports(&self) -> &[StageReport] {
        &self.reports
    }

    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    /// Advances at most one stage. Returns the report of the stage that ended.
    pub fn on_fixed_tick(&mut self, elapsed: Duration) -> Option<StageReport> {
        if self.phase() == Phase::Done {
            return None;
        }
        let boundary = self.warmup + STAGE_WINDOW * u32::try_from(self.stage).ok()?;
        if elapsed < boundary {
            return None;
        }

        self.stage += 1;
        let report = StageReport { stage: self.stage, frames: self.frames, max_steps: self.max_steps };
        tracing::info!("{report}");
        self.reports.push(report);

        self.max_steps = self.schedule.get(self.stage).unwrap_or(self.max_steps);
        self.frames = 0;

        if self.phase() == Phase::Done {
            self.log_summary();
        }
        Some(report)
    }

    fn log_summary(&self) {
        let best = self.reports.iter().max_by_key(|r| r.frames);
        tracing::info!(
            stages = self.reports.len(),
            final_max_steps = self.max_steps,
            best_max_steps = best.map(|r| r.max_steps),
            best_frames = best.map(|r| r.frames),
            "benchmark finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_line_format() {
        let report = StageReport { stage: 1, frames: 250, max_steps: 8 };
        assert_eq!(
            report.to_string(),
            "Test 1: 250 frames counted in one second at maxSteps=8 average frame render time: 0.0040"
        );
    }

    #[test]
    fn zero_frames_use_sentinel() {
        let report = StageReport { stage: 3, frames: 0, max_steps: 32 };
        assert_eq!(report.average_frame_time(), None);
        assert!(report.to_string().ends_with("average frame render time: insufficient samples"));
    }

    #[test]
    fn single_entry_schedule_is_done_immediately() {
        let mut controller = BenchmarkController::new(StepBudgetSchedule::new(vec![16]).unwrap());
        assert_eq!(controller.phase(), Phase::Done);
        assert_eq!(controller.on_fixed_tick(Duration::from_secs(60)), None);
        assert_eq!(controller.max_steps(), 16);
    }
}
