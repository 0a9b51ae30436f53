//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "FLAKY_DETECTOR";

/// Configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Runs from FLAKY_DETECTOR_RUNS
    pub runs: Option<u32>,
    /// Parallelism from FLAKY_DETECTOR_PARALLELISM
    pub parallelism: Option<usize>,
    /// Timeout from FLAKY_DETECTOR_TIMEOUT
    pub timeout: Option<u64>,
    /// Config file from FLAKY_DETECTOR_CONFIG
    pub config_file: Option<String>,
    /// Output format from FLAKY_DETECTOR_FORMAT
    pub format: Option<String>,
    /// Framework override from FLAKY_DETECTOR_FRAMEWORK
    pub framework: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source; `lookup` receives the full prefixed name
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}")).filter(|v| !v.trim().is_empty())
        };
        let get_parse = |name: &str| get(name).map(|v| v.trim().to_string());

        Self {
            runs: get_parse("RUNS").and_then(|v| v.parse().ok()),
            parallelism: get_parse("PARALLELISM").and_then(|v| v.parse().ok()),
            timeout: get_parse("TIMEOUT").and_then(|v| v.parse().ok()),
            config_file: get("CONFIG"),
            format: get("FORMAT"),
            framework: get("FRAMEWORK"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.runs.is_some()
            || self.parallelism.is_some()
            || self.timeout.is_some()
            || self.config_file.is_some()
            || self.format.is_some()
            || self.framework.is_some()
    }

    /// Get runs with fallback
    pub fn runs_or(&self, default: u32) -> u32 {
        self.runs.unwrap_or(default)
    }

    /// Get parallelism with fallback
    pub fn parallelism_or(&self, default: usize) -> usize {
        self.parallelism.unwrap_or(default)
    }

    /// Get timeout with fallback
    pub fn timeout_or(&self, default: u64) -> u64 {
        self.timeout.unwrap_or(default)
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_RUNS:        {:?}", ENV_PREFIX, self.runs);
        println!("  {}_PARALLELISM: {:?}", ENV_PREFIX, self.parallelism);
        println!("  {}_TIMEOUT:     {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_CONFIG:      {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_FORMAT:      {:?}", ENV_PREFIX, self.format);
        println!("  {}_FRAMEWORK:   {:?}", ENV_PREFIX, self.framework);
    }
}

/// Print all FLAKY_DETECTOR environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_RUNS         Number of attempts (1-1000)");
    println!("  {ENV_PREFIX}_PARALLELISM  Maximum concurrent attempts (1-50)");
    println!("  {ENV_PREFIX}_TIMEOUT      Per-attempt timeout in seconds");
    println!("  {ENV_PREFIX}_CONFIG       Path to configuration file");
    println!("  {ENV_PREFIX}_FORMAT       Output format (table, json, json-pretty, csv, summary)");
    println!("  {ENV_PREFIX}_FRAMEWORK    Framework override (python, go, typescript-jest, ...)");
    println!("  RUST_LOG                  Log filter, overrides --log-level");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_RUNS=100");
    println!("  export {ENV_PREFIX}_PARALLELISM=10");
    println!("  flaky-detector run --repo . --command 'pytest tests/test_flaky.py'");
}
