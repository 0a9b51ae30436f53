//! Output formatting module
//!
//! Provides various output formats for run summaries.

mod formatter;

pub use formatter::{write_summary_to_file, OutputFormat, ResultFormatter, DEFAULT_MAX_ERROR_LENGTH};
