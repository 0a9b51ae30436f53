//! Detection engine
//!
//! Single entry point: validate the request, resolve the framework, run the
//! batch and reduce it to a `RunSummary`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::parallel::{DEFAULT_SEED_MAX, DEFAULT_SEED_MIN};
use super::runner::DEFAULT_TIMEOUT_SECS;
use super::{AttemptExecutor, ProcessExecutor, RunScheduler};
use crate::config::AppConfig;
use crate::detect::resolve_framework;
use crate::models::{
    Framework, RepositoryRef, RequestError, RunRequest, RunSummary, SeverityThresholds,
};
use crate::results::Aggregator;

/// Errors that stop a run before any attempt is spawned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),

    #[error("Repository {0} must be checked out before running")]
    NotCheckedOut(String),

    #[error("Checkout directory does not exist: {0}")]
    MissingCheckout(PathBuf),
}

/// Repeated-execution engine
#[derive(Clone, Debug)]
pub struct DetectionEngine {
    timeout_secs: u64,
    thresholds: SeverityThresholds,
    seed_min: u32,
    seed_max: u32,
}

impl Default for DetectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionEngine {
    pub fn new() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            thresholds: SeverityThresholds::default(),
            seed_min: DEFAULT_SEED_MIN,
            seed_max: DEFAULT_SEED_MAX,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new()
            .with_timeout(config.timeout_secs)
            .with_thresholds(config.severity_thresholds)
            .with_seed_range(config.seed_range.min, config.seed_range.max)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_thresholds(mut self, thresholds: SeverityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_seed_range(mut self, min: u32, max: u32) -> Self {
        self.seed_min = min;
        self.seed_max = max;
        self
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Run against a repository that is itself a local checkout
    pub async fn run_local(&self, request: &RunRequest) -> Result<RunSummary, EngineError> {
        request.validate()?;
        match request.repository_ref()? {
            RepositoryRef::Local(path) => self.run(request, &path).await,
            RepositoryRef::Remote(url) => Err(EngineError::NotCheckedOut(url)),
        }
    }

    /// Run the request against an existing checkout
    pub async fn run(
        &self,
        request: &RunRequest,
        checkout: &Path,
    ) -> Result<RunSummary, EngineError> {
        request.validate()?;
        if !checkout.is_dir() {
            return Err(EngineError::MissingCheckout(checkout.to_path_buf()));
        }

        let framework = resolve_framework(checkout, request.framework_override());
        info!(
            "Framework: {} (seed variable {})",
            framework,
            framework.seed_env_var()
        );

        let executor = ProcessExecutor::new(checkout).with_timeout(self.timeout_secs);
        debug!(
            "Attempts run in {} with a {:?} timeout",
            executor.workdir().display(),
            executor.timeout()
        );
        self.run_with_executor(request, framework, Arc::new(executor)).await
    }

    /// Run with a caller-supplied executor; the request must be valid
    pub async fn run_with_executor(
        &self,
        request: &RunRequest,
        framework: Framework,
        executor: Arc<dyn AttemptExecutor>,
    ) -> Result<RunSummary, EngineError> {
        request.validate()?;
        let command = request.command_argv()?;

        let scheduler = RunScheduler::new(executor, request.parallelism)
            .with_seed_range(self.seed_min, self.seed_max);
        info!(
            "Running {:?} {} times with parallelism {}",
            command,
            request.runs,
            scheduler.parallelism()
        );

        let attempts = scheduler.plan(request.runs, command, framework);
        let results = scheduler.run(attempts).await;

        let summary = Aggregator::new(self.thresholds).aggregate(
            request.runs,
            request.parallelism,
            framework,
            results,
        );

        info!(
            "Reproduction rate {:.1}% ({}/{} failed) - {}",
            summary.repro_rate * 100.0,
            summary.failures,
            summary.total_runs,
            summary.severity
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::models::{Attempt, AttemptOutcome, AttemptResult, Severity};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tempfile::{tempdir, TempDir};

    fn checkout() -> TempDir {
        tempdir().unwrap()
    }

    fn request(dir: &TempDir, command: &str, runs: u32, parallelism: usize) -> RunRequest {
        RunRequest::new(dir.path().to_string_lossy(), command)
            .with_runs(runs)
            .with_parallelism(parallelism)
    }

    fn assert_dense(summary: &RunSummary, runs: u32) {
        assert_eq!(summary.results.len(), runs as usize);
        let order: Vec<u32> = summary.results.iter().map(|r| r.attempt).collect();
        assert_eq!(order, (0..runs).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_from_config_applies_settings() {
        let mut config = AppConfig {
            timeout_secs: 42,
            ..Default::default()
        };
        config.seed_range.min = 5;
        config.seed_range.max = 5;
        config.severity_thresholds.critical = 0.95;

        let engine = DetectionEngine::from_config(&config);
        assert_eq!(engine.timeout_secs(), 42);

        let dir = checkout();
        let summary = engine.run_local(&request(&dir, "true", 3, 3)).await.unwrap();
        assert!(summary.results.iter().all(|r| r.seed == 5));
    }

    #[tokio::test]
    async fn test_always_passing_command() {
        let dir = checkout();
        let summary = DetectionEngine::new()
            .run_local(&request(&dir, "true", 5, 2))
            .await
            .unwrap();

        assert_dense(&summary, 5);
        assert_eq!(summary.failures, 0);
        assert_eq!(summary.repro_rate, 0.0);
        assert_eq!(summary.severity, Severity::None);
        assert!(summary.results.iter().all(|r| r.passed()));
    }

    #[tokio::test]
    async fn test_always_failing_command() {
        let dir = checkout();
        let summary = DetectionEngine::new()
            .run_local(&request(&dir, "sh -c 'exit 1'", 5, 2))
            .await
            .unwrap();

        assert_dense(&summary, 5);
        assert_eq!(summary.failures, 5);
        assert_eq!(summary.repro_rate, 1.0);
        assert_eq!(summary.severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_timeouts_are_reported() {
        let dir = checkout();
        let summary = DetectionEngine::new()
            .with_timeout(1)
            .run_local(&request(&dir, "sleep 30", 2, 2))
            .await
            .unwrap();

        assert_dense(&summary, 2);
        for result in &summary.results {
            assert!(!result.passed());
            assert_eq!(result.stderr(), "TIMEOUT");
            assert_eq!(result.exit_code(), None);
        }
        assert_eq!(summary.breakdown.timeouts, 2);
    }

    #[tokio::test]
    async fn test_seed_dependent_failures() {
        let dir = checkout();
        let summary = DetectionEngine::new()
            .run_local(&request(&dir, "sh -c 'exit $((TEST_SEED % 2))'", 20, 4))
            .await
            .unwrap();

        assert_dense(&summary, 20);
        assert!(summary.failures > 0 && summary.failures < 20);
        assert!(summary.repro_rate > 0.0 && summary.repro_rate < 1.0);

        for result in &summary.results {
            assert_eq!(result.passed(), result.seed % 2 == 0);
        }
    }

    #[tokio::test]
    async fn test_go_checkout_injects_go_seed() {
        let dir = checkout();
        std::fs::write(dir.path().join("go.mod"), "module example.com/flaky\n").unwrap();

        let summary = DetectionEngine::new()
            .run_local(&request(
                &dir,
                "sh -c 'test -n \"$GO_TEST_SEED\" && test -z \"$TEST_SEED\" && echo $GO_TEST_SEED'",
                4,
                2,
            ))
            .await
            .unwrap();

        assert_eq!(summary.framework, Framework::Go);
        assert_eq!(summary.failures, 0);
        for result in &summary.results {
            assert_eq!(result.stdout().trim(), result.seed.to_string());
        }
    }

    #[tokio::test]
    async fn test_single_run_boundary() {
        let dir = checkout();
        let summary = DetectionEngine::new()
            .run_local(&request(&dir, "true", 1, 1))
            .await
            .unwrap();
        assert_dense(&summary, 1);
        assert!(summary.repro_rate == 0.0 || summary.repro_rate == 1.0);
    }

    #[tokio::test]
    async fn test_attempt_index_is_injected() {
        let dir = checkout();
        let summary = DetectionEngine::new()
            .run_local(&request(&dir, "sh -c 'echo $ATTEMPT'", 6, 3))
            .await
            .unwrap();
        for result in &summary.results {
            assert_eq!(result.stdout().trim(), result.attempt.to_string());
        }
    }

    #[tokio::test]
    async fn test_launch_errors_do_not_abort_batch() {
        let dir = checkout();
        let summary = DetectionEngine::new()
            .run_local(&request(&dir, "flaky-detector-missing-binary --flag", 3, 3))
            .await
            .unwrap();
        assert_dense(&summary, 3);
        assert_eq!(summary.failures, 3);
        assert_eq!(summary.breakdown.launch_errors, 3);
        assert!(summary
            .results
            .iter()
            .all(|r| r.stderr().starts_with("ERROR: ")));
    }

    #[tokio::test]
    async fn test_invalid_requests_fail_before_spawning() {
        let dir = checkout();
        let marker = dir.path().join("spawned");
        let command = format!("touch {}", marker.display());

        let engine = DetectionEngine::new();
        let err = engine
            .run_local(&request(&dir, &command, 0, 1))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::InvalidRequest(RequestError::RunsOutOfRange(0)));

        let err = engine
            .run_local(&request(&dir, &command, 5, 51))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidRequest(RequestError::ParallelismOutOfRange(51))
        );

        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_remote_repository_needs_checkout() {
        let request = RunRequest::new("https://github.com/example/repo", "pytest");
        let err = DetectionEngine::new().run_local(&request).await.unwrap_err();
        assert!(matches!(err, EngineError::NotCheckedOut(_)));

        let dir = checkout();
        let summary = DetectionEngine::new()
            .run(
                &RunRequest::new("https://github.com/example/repo", "true").with_runs(2),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(summary.total_runs, 2);
    }

    #[tokio::test]
    async fn test_missing_checkout() {
        let request = RunRequest::new("git@github.com:example/repo.git", "true");
        let err = DetectionEngine::new()
            .run(&request, Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingCheckout(_)));
    }

    #[tokio::test]
    async fn test_framework_override_wins() {
        let dir = checkout();
        std::fs::write(dir.path().join("go.mod"), "module x\n").unwrap();

        let mocha = request(&dir, "sh -c 'test -n \"$MOCHA_SEED\"'", 3, 1)
            .with_framework("javascript-mocha");
        let summary = DetectionEngine::new().run_local(&mocha).await.unwrap();
        assert_eq!(summary.framework, Framework::JavascriptMocha);
        assert_eq!(summary.failures, 0);

        let bazel = request(&dir, "sh -c 'test -n \"$TEST_SEED\"'", 2, 1).with_framework("bazel");
        let summary = DetectionEngine::new().run_local(&bazel).await.unwrap();
        assert_eq!(summary.framework, Framework::Unknown);
        assert_eq!(summary.failures, 0);
    }

    struct FlakyWorker;

    #[async_trait]
    impl AttemptExecutor for FlakyWorker {
        async fn execute(&self, attempt: &Attempt) -> AttemptResult {
            if attempt.index % 4 == 1 {
                panic!("lost worker");
            }
            AttemptResult::completed(attempt, 0, "", "", 1)
        }
    }

    #[tokio::test]
    async fn test_worker_faults_keep_cardinality() {
        let request = RunRequest::new("https://github.com/example/repo", "pytest")
            .with_runs(8)
            .with_parallelism(3);
        let summary = DetectionEngine::new()
            .run_with_executor(&request, Framework::Python, Arc::new(FlakyWorker))
            .await
            .unwrap();

        assert_dense(&summary, 8);
        let indices: HashSet<u32> = summary.results.iter().map(|r| r.attempt).collect();
        assert_eq!(indices.len(), 8);
        assert_eq!(summary.failures, 2);
        assert_eq!(summary.breakdown.worker_errors, 2);
        assert!(summary
            .failed_results()
            .all(|r| matches!(r.outcome, AttemptOutcome::WorkerFailed { .. })));
        assert_eq!(summary.repro_rate, 0.25);
    }
}
