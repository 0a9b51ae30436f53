//! Attempt execution
//!
//! Runs one attempt of the test command as a child process. Every outcome,
//! including launch errors and timeouts, comes back as an `AttemptResult`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::models::{Attempt, AttemptResult};
use crate::utils::Timer;

/// Default wall-clock limit for one attempt
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Produces the result of a single attempt
#[async_trait]
pub trait AttemptExecutor: Send + Sync {
    async fn execute(&self, attempt: &Attempt) -> AttemptResult;
}

/// Executes attempts as child processes inside a checkout
#[derive(Clone, Debug)]
pub struct ProcessExecutor {
    workdir: PathBuf,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl AttemptExecutor for ProcessExecutor {
    async fn execute(&self, attempt: &Attempt) -> AttemptResult {
        let timer = Timer::start(format!("attempt {}", attempt.index));

        let Some((program, args)) = attempt.command.split_first() else {
            return AttemptResult::launch_failed(attempt, "empty command", 0);
        };

        debug!(
            "Attempt {} starting: {:?} (seed {})",
            attempt.index, attempt.command, attempt.seed
        );

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.workdir)
            .envs(attempt.env_overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Attempt {} failed to launch {}: {}", attempt.index, program, e);
                return AttemptResult::launch_failed(attempt, e.to_string(), timer.elapsed_ms());
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Attempt {} failed while waiting: {}", attempt.index, e);
                return AttemptResult::launch_failed(attempt, e.to_string(), timer.elapsed_ms());
            }
            Err(_) => {
                warn!(
                    "Attempt {} timed out after {}s",
                    attempt.index,
                    self.timeout.as_secs()
                );
                return AttemptResult::timed_out(attempt, timer.elapsed_ms());
            }
        };

        let duration_ms = timer.stop().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        match output.status.code() {
            Some(exit_code) => {
                debug!(
                    "Attempt {} exited with {} in {}ms",
                    attempt.index, exit_code, duration_ms
                );
                AttemptResult::completed(attempt, exit_code, stdout, stderr, duration_ms)
            }
            None => AttemptResult::launch_failed(
                attempt,
                format!("process terminated without exit code ({})", output.status),
                duration_ms,
            ),
        }
    }
}
