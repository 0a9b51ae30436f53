//! Results storage and retrieval
//!
//! Persists a run summary with execution metadata as pretty JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{RunRequest, RunSummary};

/// Default output file for saved results
pub const DEFAULT_RESULTS_FILE: &str = "flaky_test_results.json";

/// Information about how a run was produced
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// When the run finished
    pub timestamp: DateTime<Utc>,

    /// Wall-clock time of the whole batch
    pub execution_time_secs: f64,

    /// Job file the request was read from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,

    pub repository: String,

    pub test_command: String,

    /// Tool version
    pub tool_version: String,
}

impl ExecutionMetadata {
    pub fn new(request: &RunRequest, elapsed: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            execution_time_secs: elapsed.as_secs_f64(),
            input_file: None,
            repository: request.repository.clone(),
            test_command: request.test_command.clone(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Saved run: the summary fields at the top level plus metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    #[serde(flatten)]
    pub summary: RunSummary,

    pub execution_metadata: ExecutionMetadata,
}

impl StoredRun {
    /// Create a stored run for a finished request
    pub fn new(summary: RunSummary, request: &RunRequest, elapsed: Duration) -> Self {
        Self {
            summary,
            execution_metadata: ExecutionMetadata::new(request, elapsed),
        }
    }

    /// Record the job file the request came from
    pub fn with_input_file(mut self, path: impl AsRef<Path>) -> Self {
        self.execution_metadata.input_file = Some(path.as_ref().display().to_string());
        self
    }

    /// Drop stdout of passing attempts; failing attempts keep everything
    pub fn strip_passing_output(mut self) -> Self {
        self.summary.results = self
            .summary
            .results
            .into_iter()
            .map(|r| if r.passed() { r.without_stdout() } else { r })
            .collect();
        self
    }

    /// Save as pretty JSON, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = File::create(path)
            .with_context(|| format!("Failed to create results file: {}", path.display()))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, self).context("Failed to write results")?;

        info!("Saved results to {}", path.display());
        Ok(path.to_path_buf())
    }

    /// Load a saved run
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open results file: {}", path.display()))?;
        let reader = BufReader::new(file);

        let run: Self = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse results file: {}", path.display()))?;

        debug!(
            "Loaded {} attempts from {}",
            run.summary.results.len(),
            path.display()
        );
        Ok(run)
    }
}
