//! Flaky Detector - repeated, seeded test execution
//!
//! Runs one test command many times against a checkout, each attempt with its
//! own random seed, and reports how often it fails.
//!
//! ## Features
//!
//! - Framework detection (pytest, go test, jest, vitest, mocha) for the seed variable
//! - Bounded parallel execution with per-attempt timeouts
//! - Reproduction rate and severity classification
//! - Multiple output formats (Table, JSON, CSV)
//!
//! ## Usage
//!
//! ```bash
//! # Run a test 100 times, 10 at a time
//! flaky-detector run --repo . --command "pytest tests/test_flaky.py" --runs 100 --parallelism 10
//!
//! # Run from a job file and save the results
//! flaky-detector run --input test_input.json --output flaky_test_results.json
//!
//! # Fail CI when more than 5% of attempts fail
//! flaky-detector run --repo . --command "go test ./..." --fail-above 0.05
//!
//! # Inspect a saved run
//! flaky-detector results flaky_test_results.json --failures
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

mod cli;
mod config;
mod detect;
mod executor;
mod models;
mod output;
mod results;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use executor::DetectionEngine;
use models::{RepositoryRef, RunRequest};
use output::{OutputFormat, ResultFormatter};
use results::StoredRun;
use utils::logger::{init_logger, LogLevel};
use utils::{format_duration, Timer};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(LogLevel::from_args(args.verbose, &args.log_level));

    match args.command {
        cli::Command::Run(run_args) => {
            run_detection(run_args).await?;
        }
        cli::Command::Detect(detect_args) => {
            detect_framework(detect_args)?;
        }
        cli::Command::Results(results_args) => {
            show_results(results_args)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args)?;
        }
    }

    Ok(())
}

async fn run_detection(args: cli::RunArgs) -> Result<()> {
    let env = EnvConfig::load();
    if env.has_any() {
        debug!("Environment overrides: {env:?}");
    }

    let base = match &args.input {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read job file: {}", path.display()))?;
            info!("Loaded request from {}", path.display());
            RunRequest::from_json(&content)
                .with_context(|| format!("Failed to parse job file: {}", path.display()))?
        }
        None => RunRequest::new(
            args.repo.clone().unwrap_or_default(),
            args.command.clone().unwrap_or_default(),
        ),
    };

    let checkout = checkout_dir(&base, args.workdir.as_deref());

    let explicit_config = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));
    let mut config = ConfigFile::resolve(explicit_config.as_deref(), checkout.as_deref())?.app;
    config.timeout_secs = args
        .timeout
        .unwrap_or_else(|| env.timeout_or(config.timeout_secs));
    config.validate()?;

    let request = apply_overrides(base, &args, &env, &config);
    request.validate()?;

    if let Some(rate) = args.fail_above {
        if !(0.0..=1.0).contains(&rate) {
            anyhow::bail!("--fail-above must be between 0.0 and 1.0, got {rate}");
        }
    }

    let format_name = args
        .format
        .clone()
        .or_else(|| env.format.clone())
        .unwrap_or_else(|| "table".to_string());
    let format = OutputFormat::from_str(&format_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {format_name}"))?;

    info!("Repository:   {}", request.repository);
    info!("Test command: {}", request.test_command);
    let engine = DetectionEngine::from_config(&config);
    info!(
        "Runs: {} | Parallelism: {} | Timeout: {}s",
        request.runs,
        request.parallelism,
        engine.timeout_secs()
    );

    let timer = Timer::start("detection run");
    let summary = match &args.workdir {
        Some(workdir) => engine.run(&request, workdir).await?,
        None => engine.run_local(&request).await?,
    };
    let elapsed = timer.stop();
    info!("Execution time: {}", format_duration(elapsed));

    let mut formatter = ResultFormatter::new(format).with_max_error_length(config.max_error_length);
    if args.no_color {
        formatter = formatter.no_color();
    }
    println!("{}", formatter.format_summary(&summary)?);

    if let Some(path) = &args.output {
        let mut stored = StoredRun::new(summary.clone(), &request, elapsed);
        if let Some(input) = &args.input {
            stored = stored.with_input_file(input);
        }
        if !config.save_full_output {
            stored = stored.strip_passing_output();
        }
        stored.save(path)?;
        eprintln!("📄 Detailed results saved to: {}", path.display());
    }

    if let Some(rate) = args.fail_above {
        if summary.repro_rate > rate {
            anyhow::bail!(
                "Reproduction rate {:.1}% exceeds --fail-above {:.1}%",
                summary.repro_rate * 100.0,
                rate * 100.0
            );
        }
    }

    Ok(())
}

/// Directory config discovery looks in: the explicit workdir, else a local repository
fn checkout_dir(request: &RunRequest, workdir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = workdir {
        return Some(dir.to_path_buf());
    }
    match request.repository_ref() {
        Ok(RepositoryRef::Local(path)) => Some(path),
        _ => None,
    }
}

/// CLI flags win over environment variables, which win over the config file
fn apply_overrides(
    mut request: RunRequest,
    args: &cli::RunArgs,
    env: &EnvConfig,
    config: &AppConfig,
) -> RunRequest {
    // A job file carries its own runs and parallelism
    if args.input.is_none() {
        request = request
            .with_runs(env.runs_or(config.runs))
            .with_parallelism(env.parallelism_or(config.parallelism));
    }
    if let Some(runs) = args.runs {
        request = request.with_runs(runs);
    }
    if let Some(parallelism) = args.parallelism {
        request = request.with_parallelism(parallelism);
    }
    if let Some(framework) = args.framework.as_deref().or(env.framework.as_deref()) {
        request = request.with_framework(framework);
    }
    request
}

fn detect_framework(args: cli::DetectArgs) -> Result<()> {
    if !args.path.is_dir() {
        anyhow::bail!("Not a directory: {}", args.path.display());
    }

    let framework = detect::detect_framework(&args.path);
    println!("Path:          {}", args.path.display());
    println!("Framework:     {framework}");
    println!("Seed variable: {}", framework.seed_env_var());
    Ok(())
}

fn show_results(args: cli::ResultsArgs) -> Result<()> {
    let stored = StoredRun::load(&args.file)?;
    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;

    let mut summary = stored.summary;
    if args.failures {
        summary.results = summary.failed_results().cloned().collect();
    }

    if format == OutputFormat::Table {
        let meta = &stored.execution_metadata;
        println!("\n📦 Repository:    {}", meta.repository);
        println!("🧪 Test command:  {}", meta.test_command);
        println!(
            "🕒 Recorded:      {}",
            meta.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("⏱️  Execution:     {:.2}s", meta.execution_time_secs);
        if let Some(input) = &meta.input_file {
            println!("📂 Job file:      {input}");
        }
        if meta.tool_version != env!("CARGO_PKG_VERSION") {
            warn!(
                "Results were written by flaky-detector {}",
                meta.tool_version
            );
        }
    }

    println!("{}", ResultFormatter::new(format).format_summary(&summary)?);

    if let Some(export) = &args.export {
        output::write_summary_to_file(export, &summary, format)?;
        println!("✓ Exported to {export}");
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs) -> Result<()> {
    use config::print_env_help;

    match args.action {
        cli::ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            let config = ConfigFile::example();
            config.save(&output)?;
            println!("✓ Configuration file created: {}", output.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env, format, file } => {
            let env_config = EnvConfig::load();
            if env {
                env_config.print_summary();
            } else {
                let explicit = file.or_else(|| env_config.config_file.as_ref().map(PathBuf::from));
                let config = ConfigFile::resolve(explicit.as_deref(), Some(Path::new(".")))?;
                let output = if format == "json" {
                    serde_json::to_string_pretty(&config)?
                } else {
                    serde_yaml::to_string(&config)?
                };
                println!("{output}");
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(|| ConfigFile::find(Some(Path::new("."))))
                .ok_or_else(|| anyhow::anyhow!("No configuration file found"))?;

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {}", path.display());
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", path.display());
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => {
            print_env_help();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> cli::RunArgs {
        let mut full = vec!["flaky-detector", "run"];
        full.extend_from_slice(argv);
        match Args::parse_from(full).command {
            cli::Command::Run(args) => args,
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_overrides_precedence() {
        let config = AppConfig {
            runs: 50,
            parallelism: 5,
            ..Default::default()
        };
        let env = EnvConfig {
            runs: Some(80),
            framework: Some("go".to_string()),
            ..Default::default()
        };

        let args = run_args(&["--repo", ".", "--command", "true", "-p", "8"]);
        let request = apply_overrides(RunRequest::new(".", "true"), &args, &env, &config);
        assert_eq!(request.runs, 80);
        assert_eq!(request.parallelism, 8);
        assert_eq!(request.framework.as_deref(), Some("go"));

        let args = run_args(&["--repo", ".", "--command", "true", "--runs", "3"]);
        let request = apply_overrides(RunRequest::new(".", "true"), &args, &env, &config);
        assert_eq!(request.runs, 3);
        assert_eq!(request.parallelism, 5);
    }

    #[test]
    fn test_job_file_values_kept() {
        let args = run_args(&["--input", "job.json"]);
        let request = RunRequest::new(".", "true").with_runs(20).with_parallelism(2);
        let request =
            apply_overrides(request, &args, &EnvConfig::default(), &AppConfig::default());
        assert_eq!(request.runs, 20);
        assert_eq!(request.parallelism, 2);
    }

    #[test]
    fn test_checkout_dir() {
        let local = RunRequest::new(".", "true");
        assert_eq!(checkout_dir(&local, None), Some(PathBuf::from(".")));

        let remote = RunRequest::new("https://github.com/acme/app", "true");
        assert_eq!(checkout_dir(&remote, None), None);
        assert_eq!(
            checkout_dir(&remote, Some(Path::new("/tmp/app"))),
            Some(PathBuf::from("/tmp/app"))
        );
    }
}
