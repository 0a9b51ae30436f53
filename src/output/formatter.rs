//! Output formatters for run summaries
//!
//! Provides Table, JSON, CSV, and one-line summary output formats.

use anyhow::{Context, Result};
use std::io::Write;

use crate::models::{AttemptResult, RunSummary, Severity};

/// Default truncation length for stderr excerpts
pub const DEFAULT_MAX_ERROR_LENGTH: usize = 200;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
    max_error_length: usize,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
            max_error_length: DEFAULT_MAX_ERROR_LENGTH,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn with_max_error_length(mut self, len: usize) -> Self {
        self.max_error_length = len;
        self
    }

    /// Format a single attempt result
    pub fn format_attempt(&self, result: &AttemptResult) -> String {
        let status = format!("{} {:12}", result.symbol(), result.status_label());
        let status = if self.colorize {
            let color = if result.passed() { "32" } else { "31" };
            format!("\x1b[{color}m{status}\x1b[0m")
        } else {
            status
        };

        let mut line = format!(
            "{:4}  {:>7}  {} [{:>7}ms]",
            result.attempt, result.seed, status, result.duration_ms
        );

        if !result.passed() {
            let stderr = result.stderr();
            let excerpt = first_line(&stderr);
            if !excerpt.is_empty() {
                line.push_str("  ");
                line.push_str(&truncate(excerpt, self.max_error_length));
            }
        }

        line
    }

    /// Format a run summary
    pub fn format_summary(&self, summary: &RunSummary) -> Result<String> {
        Ok(match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => serde_json::to_string(summary)?,
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary)?,
            OutputFormat::Csv => self.format_summary_csv(summary)?,
            OutputFormat::Summary => self.format_summary_brief(summary),
        })
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let mut output = String::new();
        let rule = "═".repeat(70);

        output.push_str(&format!("\n{rule}\n"));
        output.push_str(&format!(
            " Flaky test run - {} framework (seed variable {})\n",
            summary.framework,
            summary.framework.seed_env_var()
        ));
        output.push_str(&format!("{rule}\n"));
        output.push_str("   #     Seed  Status         Duration\n");
        output.push_str(&format!(" {}\n", "─".repeat(68)));

        for result in &summary.results {
            output.push_str(&format!(" {}\n", self.format_attempt(result)));
        }

        output.push_str(&format!(" {}\n", "─".repeat(68)));

        let pass_rate = summary.pass_rate();
        output.push_str(&format!(" Total runs:   {}\n", summary.total_runs));
        output.push_str(&format!(
            " Passed:       {} ({:.1}%)\n",
            summary.passes(),
            pass_rate
        ));
        output.push_str(&format!(
            " Failed:       {} ({:.1}%)\n",
            summary.failures,
            100.0 - pass_rate
        ));

        let breakdown = &summary.breakdown;
        if breakdown.timeouts + breakdown.launch_errors + breakdown.worker_errors > 0 {
            output.push_str(&format!(
                "   exit != 0: {} | timeouts: {} | launch errors: {} | worker errors: {}\n",
                breakdown.failed_exits,
                breakdown.timeouts,
                breakdown.launch_errors,
                breakdown.worker_errors
            ));
        }

        output.push_str(&format!(
            " Reproduction: {:.1}%\n",
            summary.repro_rate * 100.0
        ));
        output.push_str(&format!(" Parallelism:  {}\n", summary.parallelism));
        output.push_str(&format!("{rule}\n\n"));
        output.push_str(&self.format_verdict(summary));

        output
    }

    /// Severity verdict with a short recommendation
    pub fn format_verdict(&self, summary: &RunSummary) -> String {
        let severity = summary.severity;
        let headline = format!(
            "{} {}: {}",
            severity.symbol(),
            severity.name(),
            severity.verdict()
        );
        let headline = if self.colorize {
            let color = match severity {
                Severity::None | Severity::Low => "32",
                Severity::Medium => "33",
                Severity::High | Severity::Critical => "31",
            };
            format!("\x1b[{color}m{headline}\x1b[0m")
        } else {
            headline
        };

        let advice: &[&str] = match severity {
            Severity::Critical => &[
                "This appears to be a consistent, reproducible failure.",
                "The high reproduction rate suggests a real bug in the code.",
            ],
            Severity::High => &[
                "This test shows significant instability.",
                "Investigate timing, concurrency, or state management issues.",
            ],
            Severity::Medium => &[
                "This test shows intermittent flakiness.",
                "Consider stabilizing it to improve CI reliability.",
            ],
            Severity::Low => &[
                "This test shows rare flakiness.",
                "May need more runs for conclusive analysis.",
            ],
            Severity::None if summary.failures == 0 => &["All test runs passed successfully!"],
            Severity::None => &["Failure rate is below the lowest severity threshold."],
        };

        let mut output = format!("{headline}\n");
        if summary.is_consistent_failure() {
            output.push_str("Pattern: every attempt failed\n");
        } else if summary.is_flaky() {
            output.push_str(&format!(
                "Pattern: intermittent, {} of {} attempts failed\n",
                summary.failures, summary.total_runs
            ));
        }
        output.push('\n');
        for line in advice {
            output.push_str(line);
            output.push('\n');
        }
        output
    }

    fn format_summary_csv(&self, summary: &RunSummary) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "attempt",
            "seed",
            "status",
            "exit_code",
            "duration_ms",
            "stderr",
        ])?;

        for result in &summary.results {
            let stderr = result.stderr();
            writer.write_record([
                result.attempt.to_string(),
                result.seed.to_string(),
                result.status_label().to_string(),
                result.exit_code().map(|c| c.to_string()).unwrap_or_default(),
                result.duration_ms.to_string(),
                truncate(first_line(&stderr), self.max_error_length),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {e}"))?;
        String::from_utf8(bytes).context("CSV output is not valid UTF-8")
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "{} {} - {}/{} failed ({:.1}% reproduction) [{} framework, parallelism {}]",
            summary.severity.symbol(),
            summary.severity,
            summary.failures,
            summary.total_runs,
            summary.repro_rate * 100.0,
            summary.framework,
            summary.parallelism
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Write a formatted summary to a file
pub fn write_summary_to_file(path: &str, summary: &RunSummary, format: OutputFormat) -> Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_summary(summary)?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {path}"))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

/// Truncate on a char boundary, marking the cut with an ellipsis
fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_len).collect();
    cut.push('…');
    cut
}
