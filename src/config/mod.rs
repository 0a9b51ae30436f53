//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::executor::{DEFAULT_SEED_MAX, DEFAULT_SEED_MIN, DEFAULT_TIMEOUT_SECS};
use crate::models::{
    SeverityThresholds, DEFAULT_PARALLELISM, DEFAULT_RUNS, MAX_PARALLELISM, MAX_RUNS,
};
use crate::output::DEFAULT_MAX_ERROR_LENGTH;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default number of attempts
    pub runs: u32,

    /// Default maximum concurrent attempts
    pub parallelism: usize,

    /// Per-attempt timeout in seconds
    #[serde(rename = "timeout")]
    pub timeout_secs: u64,

    /// Reproduction-rate cut points for severity tiers
    pub severity_thresholds: SeverityThresholds,

    /// Range random seeds are drawn from
    #[serde(rename = "random_seed_range")]
    pub seed_range: SeedRange,

    /// Truncation length for stderr excerpts in table output
    pub max_error_length: usize,

    /// Keep stdout of passing attempts in saved results
    pub save_full_output: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            runs: DEFAULT_RUNS,
            parallelism: DEFAULT_PARALLELISM,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            severity_thresholds: SeverityThresholds::default(),
            seed_range: SeedRange::default(),
            max_error_length: DEFAULT_MAX_ERROR_LENGTH,
            save_full_output: false,
        }
    }
}

impl AppConfig {
    /// Validate ranges and threshold ordering
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_RUNS).contains(&self.runs) {
            anyhow::bail!("runs must be between 1 and {MAX_RUNS}, got {}", self.runs);
        }
        if !(1..=MAX_PARALLELISM).contains(&self.parallelism) {
            anyhow::bail!(
                "parallelism must be between 1 and {MAX_PARALLELISM}, got {}",
                self.parallelism
            );
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout must be at least 1 second");
        }
        if self.seed_range.min > self.seed_range.max {
            anyhow::bail!(
                "random_seed_range min ({}) exceeds max ({})",
                self.seed_range.min,
                self.seed_range.max
            );
        }
        self.severity_thresholds
            .validate()
            .context("Invalid severity_thresholds")?;
        Ok(())
    }
}

/// Inclusive seed range
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedRange {
    pub min: u32,
    pub max: u32,
}

impl Default for SeedRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_SEED_MIN,
            max: DEFAULT_SEED_MAX,
        }
    }
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
