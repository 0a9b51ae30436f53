//! Logging utilities
//!
//! Provides logging configuration and helpers.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Level from CLI flags; `--verbose` wins over `--log-level`
    pub fn from_args(verbose: bool, level: &str) -> Self {
        if verbose {
            LogLevel::Debug
        } else {
            Self::from_str(level).unwrap_or(LogLevel::Info)
        }
    }
}

fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "flaky_detector={}",
            level.to_tracing_level().as_str().to_lowercase()
        ))
    })
}

/// Initialize the logger with specified level
///
/// Logs go to stderr so JSON and CSV output on stdout stay clean.
/// `RUST_LOG` overrides the level when set.
pub fn init_logger(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
