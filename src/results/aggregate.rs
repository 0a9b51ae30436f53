//! Result aggregation and severity classification
//!
//! Reduces a batch of attempt results to a `RunSummary`. Pure: no I/O.

use crate::models::{
    AttemptOutcome, AttemptResult, FailureBreakdown, Framework, RunSummary, SeverityThresholds,
};

/// Reduces attempt results into a summary
#[derive(Clone, Copy, Debug, Default)]
pub struct Aggregator {
    thresholds: SeverityThresholds,
}

impl Aggregator {
    pub fn new(thresholds: SeverityThresholds) -> Self {
        Self { thresholds }
    }

    /// Build the summary for a completed batch
    ///
    /// `total_runs` must be non-zero; request validation guarantees it.
    pub fn aggregate(
        &self,
        total_runs: u32,
        parallelism: usize,
        framework: Framework,
        mut results: Vec<AttemptResult>,
    ) -> RunSummary {
        debug_assert!(total_runs > 0);
        debug_assert_eq!(results.len(), total_runs as usize);

        results.sort_by_key(|r| r.attempt);

        let breakdown = failure_breakdown(&results);
        let failures = breakdown.total();
        let repro_rate = repro_rate(failures, total_runs);

        RunSummary {
            total_runs,
            parallelism,
            framework,
            failures,
            repro_rate,
            severity: self.thresholds.classify(repro_rate),
            breakdown,
            results,
        }
    }
}

/// Count failing attempts by cause
fn failure_breakdown(results: &[AttemptResult]) -> FailureBreakdown {
    let mut breakdown = FailureBreakdown::default();

    for result in results {
        match &result.outcome {
            AttemptOutcome::Completed { exit_code: 0, .. } => {}
            AttemptOutcome::Completed { .. } => breakdown.failed_exits += 1,
            AttemptOutcome::TimedOut => breakdown.timeouts += 1,
            AttemptOutcome::LaunchFailed { .. } => breakdown.launch_errors += 1,
            AttemptOutcome::WorkerFailed { .. } => breakdown.worker_errors += 1,
        }
    }

    breakdown
}

/// `failures / runs` rounded to three decimals
///
/// Rounds the exact binary value of the quotient: fixed-precision formatting
/// expands the double exactly, so 1/80 (stored just above 0.0125) gives 0.013
/// and 3/80 (just below 0.0375) gives 0.037. Scaling by 1000 first would lose
/// that and round a tie that is not there.
pub fn repro_rate(failures: u32, runs: u32) -> f64 {
    if runs == 0 {
        return 0.0;
    }
    let rate = failures as f64 / runs as f64;
    format!("{rate:.3}").parse().unwrap_or(rate)
}
