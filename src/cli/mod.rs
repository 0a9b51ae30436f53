//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Flaky test detector
#[derive(Parser, Debug)]
#[command(name = "flaky-detector")]
#[command(version)]
#[command(about = "Run a test command many times in parallel and measure how often it fails")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a test command repeatedly and classify its flakiness
    Run(RunArgs),

    /// Detect the test framework of a checkout
    Detect(DetectArgs),

    /// View saved results
    Results(ResultsArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Repository: a local directory, or an https:// / git@ URL used with --workdir
    #[arg(short, long)]
    pub repo: Option<String>,

    /// Test command to execute on every attempt
    #[arg(short, long)]
    pub command: Option<String>,

    /// Number of attempts (1-1000)
    #[arg(short = 'n', long)]
    pub runs: Option<u32>,

    /// Maximum concurrent attempts (1-50)
    #[arg(short, long)]
    pub parallelism: Option<usize>,

    /// Framework override (python, go, typescript-jest, typescript-vitest, javascript-mocha)
    #[arg(long)]
    pub framework: Option<String>,

    /// Existing checkout to run in when --repo is a remote URL
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Read the request from a job JSON file
    #[arg(short, long, conflicts_with_all = ["repo", "command"])]
    pub input: Option<PathBuf>,

    /// Per-attempt timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Save results as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Exit non-zero when the reproduction rate exceeds this value (0.0-1.0)
    #[arg(long)]
    pub fail_above: Option<f64>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for detect command
#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// Directory to inspect
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Saved results file
    #[arg(default_value = crate::results::DEFAULT_RESULTS_FILE)]
    pub file: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Export formatted output to file
    #[arg(short, long)]
    pub export: Option<String>,

    /// Show only failing attempts
    #[arg(long)]
    pub failures: bool,
}

/// Arguments for config management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show {
        /// Show environment variable overrides instead
        #[arg(long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Configuration file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = ".flaky-detector.yml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file (defaults to the discovered one)
        file: Option<PathBuf>,
    },

    /// List supported environment variables
    Env,
}
