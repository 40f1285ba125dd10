#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! Step-budget benchmark.
//!
//! A [`BenchmarkController`] walks a [`StepBudgetSchedule`] forward in time.
//! After a warm-up it moves to the next budget once per second and logs how
//! many frames the previous budget managed.

pub mod controller;
pub mod schedule;

pub use controller::{BenchmarkController, Phase, StageReport, DEFAULT_WARMUP, STAGE_WINDOW};
pub use schedule::StepBudgetSchedule;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BenchError {
    #[error("step budget schedule is empty")]
    EmptySchedule,
    #[error("step budget at position {index} is zero")]
    ZeroBudget { index: usize },
    #[error("invalid step budget `{0}`")]
    Parse(String),
}
