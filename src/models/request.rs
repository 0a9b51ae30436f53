//! Run request model and validation
//!
//! A request is validated in full before anything is spawned.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::Framework;

pub const DEFAULT_RUNS: u32 = 10;
pub const DEFAULT_PARALLELISM: usize = 4;
pub const MAX_RUNS: u32 = 1000;
pub const MAX_PARALLELISM: usize = 50;

/// Request validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Repository is required")]
    MissingRepository,

    #[error("Test command is required")]
    MissingTestCommand,

    #[error("Test command cannot be tokenized: {0}")]
    MalformedTestCommand(String),

    #[error("Runs must be between 1 and 1000, got {0}")]
    RunsOutOfRange(u32),

    #[error("Parallelism must be between 1 and 50, got {0}")]
    ParallelismOutOfRange(usize),

    #[error("Invalid repository: {0}")]
    MalformedRepository(String),
}

/// Where the repository under test lives
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RepositoryRef {
    /// Remote identifier; must be checked out before the engine runs
    Remote(String),
    /// Existing local checkout
    Local(PathBuf),
}

/// Request to run a test command repeatedly
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(rename = "repo", alias = "repository")]
    pub repository: String,

    pub test_command: String,

    #[serde(default = "default_runs")]
    pub runs: u32,

    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Explicit framework; skips detection when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

fn default_runs() -> u32 {
    DEFAULT_RUNS
}

fn default_parallelism() -> usize {
    DEFAULT_PARALLELISM
}

/// Job input as submitted by a queue, either bare or wrapped in `input`
#[derive(Deserialize)]
#[serde(untagged)]
enum JobInput {
    Wrapped { input: RunRequest },
    Bare(RunRequest),
}

impl RunRequest {
    /// Create a request with default run count and parallelism
    pub fn new(repository: impl Into<String>, test_command: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            test_command: test_command.into(),
            runs: DEFAULT_RUNS,
            parallelism: DEFAULT_PARALLELISM,
            framework: None,
        }
    }

    pub fn with_runs(mut self, runs: u32) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    /// Parse a job input document
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        let input: JobInput = serde_json::from_str(content)?;
        Ok(match input {
            JobInput::Wrapped { input } => input,
            JobInput::Bare(request) => request,
        })
    }

    /// Validate the request without side effects
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.repository.trim().is_empty() {
            return Err(RequestError::MissingRepository);
        }
        if self.test_command.trim().is_empty() {
            return Err(RequestError::MissingTestCommand);
        }
        if !(1..=MAX_RUNS).contains(&self.runs) {
            return Err(RequestError::RunsOutOfRange(self.runs));
        }
        if !(1..=MAX_PARALLELISM).contains(&self.parallelism) {
            return Err(RequestError::ParallelismOutOfRange(self.parallelism));
        }
        self.repository_ref()?;
        self.command_argv()?;
        Ok(())
    }

    /// Classify the repository identifier
    pub fn repository_ref(&self) -> Result<RepositoryRef, RequestError> {
        let repo = self.repository.trim();
        if repo.is_empty() {
            return Err(RequestError::MissingRepository);
        }

        if repo.starts_with("https://") || repo.starts_with("git@") {
            return Ok(RepositoryRef::Remote(repo.to_string()));
        }
        if repo.contains("://") {
            return Err(RequestError::MalformedRepository(repo.to_string()));
        }

        let path = Path::new(repo);
        if path.is_dir() {
            Ok(RepositoryRef::Local(path.to_path_buf()))
        } else {
            Err(RequestError::MalformedRepository(repo.to_string()))
        }
    }

    /// Tokenize the test command with shell word-splitting rules
    pub fn command_argv(&self) -> Result<Vec<String>, RequestError> {
        let argv = shlex::split(&self.test_command)
            .ok_or_else(|| RequestError::MalformedTestCommand(self.test_command.clone()))?;
        if argv.is_empty() {
            return Err(RequestError::MissingTestCommand);
        }
        Ok(argv)
    }

    /// Framework override, if one was given
    pub fn framework_override(&self) -> Option<Framework> {
        self.framework
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .map(Framework::from_override)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn remote(cmd: &str) -> RunRequest {
        RunRequest::new("https://github.com/example/repo", cmd)
    }

    #[test]
    fn test_defaults() {
        let request = remote("pytest");
        assert_eq!(request.runs, 10);
        assert_eq!(request.parallelism, 4);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            RunRequest::new("", "pytest").validate(),
            Err(RequestError::MissingRepository)
        );
        assert_eq!(remote("   ").validate(), Err(RequestError::MissingTestCommand));
    }

    #[test]
    fn test_runs_bounds() {
        assert_eq!(
            remote("pytest").with_runs(0).validate(),
            Err(RequestError::RunsOutOfRange(0))
        );
        assert_eq!(
            remote("pytest").with_runs(1001).validate(),
            Err(RequestError::RunsOutOfRange(1001))
        );
        assert!(remote("pytest").with_runs(1).validate().is_ok());
        assert!(remote("pytest").with_runs(1000).validate().is_ok());
    }

    #[test]
    fn test_parallelism_bounds() {
        assert_eq!(
            remote("pytest").with_parallelism(0).validate(),
            Err(RequestError::ParallelismOutOfRange(0))
        );
        assert_eq!(
            remote("pytest").with_parallelism(51).validate(),
            Err(RequestError::ParallelismOutOfRange(51))
        );
        assert!(remote("pytest").with_parallelism(50).validate().is_ok());
    }

    #[test]
    fn test_repository_forms() {
        assert!(matches!(
            RunRequest::new("git@github.com:example/repo.git", "pytest").repository_ref(),
            Ok(RepositoryRef::Remote(_))
        ));
        assert!(matches!(
            RunRequest::new("ftp://example.com/repo", "pytest").validate(),
            Err(RequestError::MalformedRepository(_))
        ));
        assert!(matches!(
            RunRequest::new("/definitely/not/a/checkout", "pytest").validate(),
            Err(RequestError::MalformedRepository(_))
        ));

        let dir = tempdir().unwrap();
        let local = RunRequest::new(dir.path().to_string_lossy(), "pytest");
        assert_eq!(
            local.repository_ref(),
            Ok(RepositoryRef::Local(dir.path().to_path_buf()))
        );
    }

    #[test]
    fn test_command_tokenization() {
        let request = remote("pytest -k 'slow and not network' tests/");
        assert_eq!(
            request.command_argv().unwrap(),
            vec!["pytest", "-k", "slow and not network", "tests/"]
        );

        // Metacharacters are kept literal, never interpreted
        let request = remote("echo hi; rm -rf /");
        assert_eq!(
            request.command_argv().unwrap(),
            vec!["echo", "hi;", "rm", "-rf", "/"]
        );

        assert!(matches!(
            remote("pytest 'unterminated").validate(),
            Err(RequestError::MalformedTestCommand(_))
        ));
    }

    #[test]
    fn test_framework_override() {
        assert_eq!(remote("go test").framework_override(), None);
        assert_eq!(
            remote("go test").with_framework("go").framework_override(),
            Some(Framework::Go)
        );
        assert_eq!(
            remote("x").with_framework("bazel").framework_override(),
            Some(Framework::Unknown)
        );
        assert_eq!(
            remote("go test").with_framework("Go").framework_override(),
            Some(Framework::Unknown)
        );
    }

    #[test]
    fn test_from_json_job_input() {
        let wrapped = r#"{"input": {"repo": "https://github.com/a/b", "test_command": "pytest", "runs": 50}}"#;
        let request = RunRequest::from_json(wrapped).unwrap();
        assert_eq!(request.runs, 50);
        assert_eq!(request.parallelism, 4);

        let bare = r#"{"repo": "https://github.com/a/b", "test_command": "go test ./...", "framework": "go"}"#;
        let request = RunRequest::from_json(bare).unwrap();
        assert_eq!(request.runs, 10);
        assert_eq!(request.framework.as_deref(), Some("go"));
    }
}
