//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{is_yaml_file, AppConfig};

/// Config file names looked up inside the checkout under test
const REPO_CONFIG_NAMES: &[&str] = &[".flaky-detector.yml", ".flaky-detector.yaml"];

/// Fallback locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./flaky-detector.yaml",
    "./flaky-detector.yml",
    "~/.config/flaky-detector/config.yaml",
    "~/.flaky-detector.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Full configuration file structure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Settings live at the top level of the file
    #[serde(flatten)]
    pub app: AppConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Find a configuration file: the checkout first, then standard locations
    pub fn find(checkout: Option<&Path>) -> Option<PathBuf> {
        if let Some(dir) = checkout {
            for name in REPO_CONFIG_NAMES {
                let path = dir.join(name);
                if path.is_file() {
                    return Some(path);
                }
            }
        }

        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.is_file())
    }

    /// Load an explicit file, or discover one, or fall back to defaults
    pub fn resolve(explicit: Option<&Path>, checkout: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::find(checkout) {
            Some(path) => {
                info!("Using config file {}", path.display());
                Self::load(&path)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // An empty YAML document means "all defaults"
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        // Create parent directory if needed
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }
        self.app.validate()
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            version: default_version(),
            app: AppConfig {
                runs: 50,
                parallelism: 5,
                ..AppConfig::default()
            },
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
