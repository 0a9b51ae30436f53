//! Run summary and severity models

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::{AttemptResult, Framework};

/// Severity tier of a reproduction rate
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::None => "✅",
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🟠",
            Severity::Critical => "🔴",
        }
    }

    /// Short human verdict
    pub fn verdict(&self) -> &'static str {
        match self {
            Severity::None => "No flakiness detected",
            Severity::Low => "Occasional flakiness",
            Severity::Medium => "Clear flaky behavior detected",
            Severity::High => "Test fails frequently - needs investigation",
            Severity::Critical => "Very high failure rate - likely a real bug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Threshold ordering violations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("Low threshold must be greater than 0, got {0}")]
    NonPositiveLow(f64),

    #[error("Thresholds must satisfy critical >= high >= medium >= low (got {critical} / {high} / {medium} / {low})")]
    Unordered {
        critical: f64,
        high: f64,
        medium: f64,
        low: f64,
    },
}

/// Cut points for severity classification
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: 0.9,
            high: 0.5,
            medium: 0.1,
            low: 0.01,
        }
    }
}

impl SeverityThresholds {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        if !(self.low > 0.0) {
            return Err(ThresholdError::NonPositiveLow(self.low));
        }
        if !(self.critical >= self.high && self.high >= self.medium && self.medium >= self.low) {
            return Err(ThresholdError::Unordered {
                critical: self.critical,
                high: self.high,
                medium: self.medium,
                low: self.low,
            });
        }
        Ok(())
    }

    /// Highest tier whose threshold the rate meets, evaluated top-down
    pub fn classify(&self, repro_rate: f64) -> Severity {
        if repro_rate >= self.critical {
            Severity::Critical
        } else if repro_rate >= self.high {
            Severity::High
        } else if repro_rate >= self.medium {
            Severity::Medium
        } else if repro_rate >= self.low {
            Severity::Low
        } else {
            Severity::None
        }
    }
}

/// Failing attempts split by cause
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBreakdown {
    pub failed_exits: u32,
    pub timeouts: u32,
    pub launch_errors: u32,
    pub worker_errors: u32,
}

impl FailureBreakdown {
    pub fn total(&self) -> u32 {
        self.failed_exits + self.timeouts + self.launch_errors + self.worker_errors
    }
}

/// Summary of one detection run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_runs: u32,
    pub parallelism: usize,
    pub framework: Framework,
    pub failures: u32,
    pub repro_rate: f64,
    pub severity: Severity,
    #[serde(default)]
    pub breakdown: FailureBreakdown,
    pub results: Vec<AttemptResult>,
}

impl RunSummary {
    pub fn passes(&self) -> u32 {
        self.total_runs - self.failures
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            (self.passes() as f64 / self.total_runs as f64) * 100.0
        }
    }

    /// Some but not all attempts failed
    pub fn is_flaky(&self) -> bool {
        self.failures > 0 && self.failures < self.total_runs
    }

    /// Every attempt failed
    pub fn is_consistent_failure(&self) -> bool {
        self.total_runs > 0 && self.failures == self.total_runs
    }

    pub fn failed_results(&self) -> impl Iterator<Item = &AttemptResult> {
        self.results.iter().filter(|r| !r.passed())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Flaky test run - {} framework", self.framework)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Runs: {} | Pass: {} | Fail: {} | Parallelism: {}",
            self.total_runs,
            self.passes(),
            self.failures,
            self.parallelism
        )?;
        writeln!(
            f,
            "Reproduction Rate: {:.1}% | Severity: {} {}",
            self.repro_rate * 100.0,
            self.severity.symbol(),
            self.severity
        )
    }
}
