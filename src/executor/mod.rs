//! Test execution engine
//!
//! Provides per-attempt process execution, bounded parallel scheduling and
//! the detection engine that drives them.

mod engine;
mod parallel;
mod runner;

pub use engine::DetectionEngine;
pub use parallel::{RunScheduler, DEFAULT_SEED_MAX, DEFAULT_SEED_MIN};
pub use runner::{AttemptExecutor, ProcessExecutor, DEFAULT_TIMEOUT_SECS};
