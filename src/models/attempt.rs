//! Attempt models
//!
//! Defines a single seeded execution of the test command and its outcome.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::Framework;

/// Wire marker written to stderr when an attempt hits the timeout
pub const TIMEOUT_MARKER: &str = "TIMEOUT";
/// Wire prefix for execution-layer errors
pub const ERROR_PREFIX: &str = "ERROR: ";
/// Wire prefix for scheduling-layer faults
pub const WORKER_ERROR_PREFIX: &str = "WORKER ERROR: ";

/// Environment variable carrying the attempt index
pub const ATTEMPT_ENV_VAR: &str = "ATTEMPT";

/// One execution of the test command
#[derive(Clone, Debug)]
pub struct Attempt {
    pub index: u32,
    pub seed: u32,
    pub command: Arc<Vec<String>>,
    pub env_overrides: Vec<(String, String)>,
}

impl Attempt {
    pub fn new(index: u32, seed: u32, command: Arc<Vec<String>>, framework: Framework) -> Self {
        let env_overrides = vec![
            (framework.seed_env_var().to_string(), seed.to_string()),
            (ATTEMPT_ENV_VAR.to_string(), index.to_string()),
        ];

        Self {
            index,
            seed,
            command,
            env_overrides,
        }
    }

    #[cfg(test)]
    pub fn env(&self, key: &str) -> Option<&str> {
        self.env_overrides
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// How an attempt ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Process exited on its own
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// Wall-clock timeout elapsed and the process was killed
    TimedOut,
    /// Process could not be launched or awaited
    LaunchFailed { message: String },
    /// The scheduler lost the task running this attempt
    WorkerFailed { message: String },
}

/// Result of a single attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "AttemptRecord", try_from = "AttemptRecord")]
pub struct AttemptResult {
    pub attempt: u32,
    pub seed: u32,
    pub duration_ms: u64,
    pub outcome: AttemptOutcome,
}

impl AttemptResult {
    pub fn completed(
        attempt: &Attempt,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            attempt: attempt.index,
            seed: attempt.seed,
            duration_ms,
            outcome: AttemptOutcome::Completed {
                exit_code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            },
        }
    }

    pub fn timed_out(attempt: &Attempt, duration_ms: u64) -> Self {
        Self {
            attempt: attempt.index,
            seed: attempt.seed,
            duration_ms,
            outcome: AttemptOutcome::TimedOut,
        }
    }

    pub fn launch_failed(attempt: &Attempt, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            attempt: attempt.index,
            seed: attempt.seed,
            duration_ms,
            outcome: AttemptOutcome::LaunchFailed {
                message: message.into(),
            },
        }
    }

    pub fn worker_failed(attempt: &Attempt, message: impl Into<String>) -> Self {
        Self {
            attempt: attempt.index,
            seed: attempt.seed,
            duration_ms: 0,
            outcome: AttemptOutcome::WorkerFailed {
                message: message.into(),
            },
        }
    }

    /// True iff the process exited with code exactly 0
    pub fn passed(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Completed { exit_code: 0, .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.outcome {
            AttemptOutcome::Completed { exit_code, .. } => Some(exit_code),
            _ => None,
        }
    }

    pub fn stdout(&self) -> &str {
        match &self.outcome {
            AttemptOutcome::Completed { stdout, .. } => stdout,
            _ => "",
        }
    }

    /// Captured stderr, or the wire marker for outcomes without a process
    pub fn stderr(&self) -> Cow<'_, str> {
        match &self.outcome {
            AttemptOutcome::Completed { stderr, .. } => Cow::Borrowed(stderr),
            AttemptOutcome::TimedOut => Cow::Borrowed(TIMEOUT_MARKER),
            AttemptOutcome::LaunchFailed { message } => {
                Cow::Owned(format!("{ERROR_PREFIX}{message}"))
            }
            AttemptOutcome::WorkerFailed { message } => {
                Cow::Owned(format!("{WORKER_ERROR_PREFIX}{message}"))
            }
        }
    }

    pub fn symbol(&self) -> &'static str {
        match &self.outcome {
            AttemptOutcome::Completed { exit_code: 0, .. } => "✓",
            AttemptOutcome::Completed { .. } => "✗",
            AttemptOutcome::TimedOut => "⏱",
            AttemptOutcome::LaunchFailed { .. } | AttemptOutcome::WorkerFailed { .. } => "!",
        }
    }

    pub fn status_label(&self) -> &'static str {
        match &self.outcome {
            AttemptOutcome::Completed { exit_code: 0, .. } => "PASS",
            AttemptOutcome::Completed { .. } => "FAIL",
            AttemptOutcome::TimedOut => "TIMEOUT",
            AttemptOutcome::LaunchFailed { .. } => "ERROR",
            AttemptOutcome::WorkerFailed { .. } => "WORKER ERROR",
        }
    }

    /// Drop captured stdout; used when full output is not kept
    pub fn without_stdout(mut self) -> Self {
        if let AttemptOutcome::Completed { stdout, .. } = &mut self.outcome {
            stdout.clear();
        }
        self
    }
}

impl fmt::Display for AttemptResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Attempt {} (seed {}) {} [{}ms]",
            self.symbol(),
            self.attempt,
            self.seed,
            self.status_label(),
            self.duration_ms
        )?;
        if let Some(code) = self.exit_code() {
            write!(f, " exit={code}")?;
        }
        Ok(())
    }
}

/// Wire form of an attempt result
#[derive(Clone, Debug, Serialize, Deserialize)]
struct AttemptRecord {
    attempt: u32,
    exit_code: Option<i32>,
    passed: bool,
    stdout: String,
    stderr: String,
    #[serde(default)]
    seed: u32,
    #[serde(default)]
    duration_ms: u64,
}

impl From<AttemptResult> for AttemptRecord {
    fn from(result: AttemptResult) -> Self {
        Self {
            attempt: result.attempt,
            exit_code: result.exit_code(),
            passed: result.passed(),
            stdout: result.stdout().to_string(),
            stderr: result.stderr().into_owned(),
            seed: result.seed,
            duration_ms: result.duration_ms,
        }
    }
}

/// A stored attempt whose fields contradict each other
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("attempt {attempt}: passed is {passed} but exit code is {exit_code}")]
    PassedMismatch {
        attempt: u32,
        passed: bool,
        exit_code: i32,
    },

    #[error("attempt {attempt}: passed without an exit code")]
    PassedWithoutExitCode { attempt: u32 },

    #[error("attempt {attempt}: no exit code and stderr carries no outcome marker: {stderr:?}")]
    UnmarkedFailure { attempt: u32, stderr: String },
}

impl TryFrom<AttemptRecord> for AttemptResult {
    type Error = RecordError;

    fn try_from(record: AttemptRecord) -> Result<Self, Self::Error> {
        let attempt = record.attempt;
        let outcome = match record.exit_code {
            Some(exit_code) => {
                if record.passed != (exit_code == 0) {
                    return Err(RecordError::PassedMismatch {
                        attempt,
                        passed: record.passed,
                        exit_code,
                    });
                }
                AttemptOutcome::Completed {
                    exit_code,
                    stdout: record.stdout,
                    stderr: record.stderr,
                }
            }
            None if record.passed => {
                return Err(RecordError::PassedWithoutExitCode { attempt });
            }
            None if record.stderr == TIMEOUT_MARKER => AttemptOutcome::TimedOut,
            None => {
                if let Some(message) = record.stderr.strip_prefix(WORKER_ERROR_PREFIX) {
                    AttemptOutcome::WorkerFailed {
                        message: message.to_string(),
                    }
                } else if let Some(message) = record.stderr.strip_prefix(ERROR_PREFIX) {
                    AttemptOutcome::LaunchFailed {
                        message: message.to_string(),
                    }
                } else {
                    return Err(RecordError::UnmarkedFailure {
                        attempt,
                        stderr: record.stderr,
                    });
                }
            }
        };

        Ok(Self {
            attempt,
            seed: record.seed,
            duration_ms: record.duration_ms,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(index: u32) -> Attempt {
        let command = Arc::new(vec!["pytest".to_string()]);
        Attempt::new(index, 4242, command, Framework::Python)
    }

    #[test]
    fn test_attempt_env_overrides() {
        let a = Attempt::new(3, 77, Arc::new(vec!["go".into()]), Framework::Go);
        assert_eq!(a.env("GO_TEST_SEED"), Some("77"));
        assert_eq!(a.env("ATTEMPT"), Some("3"));
        assert_eq!(a.env("TEST_SEED"), None);
    }

    #[test]
    fn test_passed_only_on_exit_zero() {
        assert!(AttemptResult::completed(&attempt(0), 0, "ok", "", 5).passed());
        assert!(!AttemptResult::completed(&attempt(0), 1, "", "boom", 5).passed());
        assert!(!AttemptResult::completed(&attempt(0), -1, "", "", 5).passed());
        assert!(!AttemptResult::timed_out(&attempt(0), 5).passed());
    }

    #[test]
    fn test_wire_markers() {
        let timeout = AttemptResult::timed_out(&attempt(1), 300_000);
        assert_eq!(timeout.stderr(), "TIMEOUT");
        assert_eq!(timeout.exit_code(), None);

        let launch = AttemptResult::launch_failed(&attempt(2), "No such file or directory", 1);
        assert_eq!(launch.stderr(), "ERROR: No such file or directory");

        let worker = AttemptResult::worker_failed(&attempt(3), "task panicked");
        assert_eq!(worker.stderr(), "WORKER ERROR: task panicked");
        assert_eq!(worker.stdout(), "");
    }

    #[test]
    fn test_serialized_shape() {
        let result = AttemptResult::timed_out(&attempt(4), 10);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["attempt"], 4);
        assert_eq!(value["exit_code"], serde_json::Value::Null);
        assert_eq!(value["passed"], false);
        assert_eq!(value["stderr"], "TIMEOUT");
        assert_eq!(value["stdout"], "");
    }

    #[test]
    fn test_deserialize_restores_outcome() {
        let worker: AttemptResult = serde_json::from_str(
            r#"{"attempt": 7, "exit_code": null, "passed": false, "stdout": "", "stderr": "WORKER ERROR: lost"}"#,
        )
        .unwrap();
        assert_eq!(
            worker.outcome,
            AttemptOutcome::WorkerFailed {
                message: "lost".to_string()
            }
        );

        let launch: AttemptResult = serde_json::from_str(
            r#"{"attempt": 8, "exit_code": null, "passed": false, "stdout": "", "stderr": "ERROR: not found"}"#,
        )
        .unwrap();
        assert_eq!(
            launch.outcome,
            AttemptOutcome::LaunchFailed {
                message: "not found".to_string()
            }
        );
    }

    #[test]
    fn test_without_stdout() {
        let result = AttemptResult::completed(&attempt(0), 0, "lots of output", "", 1).without_stdout();
        assert_eq!(result.stdout(), "");
        assert!(result.passed());
    }

    #[test]
    fn test_contradictory_records_rejected() {
        let parse = |json: &str| serde_json::from_str::<AttemptResult>(json);

        let err = parse(
            r#"{"attempt": 1, "exit_code": null, "passed": false, "stdout": "", "stderr": ""}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no outcome marker"));

        assert!(parse(
            r#"{"attempt": 2, "exit_code": null, "passed": false, "stdout": "", "stderr": "segfault"}"#,
        )
        .is_err());
        assert!(parse(
            r#"{"attempt": 3, "exit_code": 0, "passed": false, "stdout": "", "stderr": ""}"#,
        )
        .is_err());
        assert!(parse(
            r#"{"attempt": 4, "exit_code": 1, "passed": true, "stdout": "", "stderr": ""}"#,
        )
        .is_err());
        assert!(parse(
            r#"{"attempt": 5, "exit_code": null, "passed": true, "stdout": "", "stderr": "TIMEOUT"}"#,
        )
        .is_err());
    }

    #[test]
    fn test_record_conversion_errors() {
        let record = AttemptRecord {
            attempt: 9,
            exit_code: None,
            passed: false,
            stdout: String::new(),
            stderr: String::new(),
            seed: 1,
            duration_ms: 0,
        };
        assert_eq!(
            AttemptResult::try_from(record),
            Err(RecordError::UnmarkedFailure {
                attempt: 9,
                stderr: String::new()
            })
        );
    }

    #[test]
    fn test_every_outcome_survives_json() {
        let results = vec![
            AttemptResult::completed(&attempt(0), 0, "ok", "", 3),
            AttemptResult::completed(&attempt(1), 2, "", "assert failed", 4),
            AttemptResult::timed_out(&attempt(2), 300_000),
            AttemptResult::launch_failed(&attempt(3), "", 1),
            AttemptResult::worker_failed(&attempt(4), "task panicked"),
        ];
        let json = serde_json::to_string(&results).unwrap();
        let restored: Vec<AttemptResult> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, results);
    }
}
