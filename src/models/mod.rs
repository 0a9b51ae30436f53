//! Data models for flaky test detection
//!
//! This module contains all data structures shared by the engine and the CLI.

mod attempt;
mod framework;
mod request;
mod summary;

pub use attempt::{Attempt, AttemptOutcome, AttemptResult};
pub use framework::Framework;
pub use request::{
    RepositoryRef, RequestError, RunRequest, DEFAULT_PARALLELISM, DEFAULT_RUNS, MAX_PARALLELISM,
    MAX_RUNS,
};
pub use summary::{FailureBreakdown, RunSummary, Severity, SeverityThresholds};
