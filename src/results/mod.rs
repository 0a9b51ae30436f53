//! Results aggregation and storage module
//!
//! Reduces attempt results into a severity-classified summary and persists it.

mod aggregate;
mod storage;

pub use aggregate::Aggregator;
pub use storage::{StoredRun, DEFAULT_RESULTS_FILE};
