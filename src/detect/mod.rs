//! Framework detection
//!
//! Inspects a checkout for marker files to pick the seed convention.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::models::Framework;

/// Python project markers, any one is enough
const PYTHON_MARKERS: &[&str] = &["requirements.txt", "pyproject.toml", "setup.py"];

/// JS test runners in match priority
const JS_RUNNERS: &[(&str, Framework)] = &[
    ("jest", Framework::TypescriptJest),
    ("vitest", Framework::TypescriptVitest),
    ("mocha", Framework::JavascriptMocha),
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    #[serde(default)]
    dependencies: HashMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: HashMap<String, serde_json::Value>,
}

impl PackageManifest {
    fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }
}

/// Detect the framework of a checkout
pub fn detect_framework(repo_path: impl AsRef<Path>) -> Framework {
    let repo_path = repo_path.as_ref();

    if repo_path.join("go.mod").is_file() {
        debug!("Found go.mod in {}", repo_path.display());
        return Framework::Go;
    }

    if let Some(framework) = detect_js_runner(repo_path) {
        return framework;
    }

    if PYTHON_MARKERS
        .iter()
        .any(|marker| repo_path.join(marker).is_file())
    {
        return Framework::Python;
    }

    Framework::Unknown
}

/// Resolve the framework for a run: an explicit override wins over detection
pub fn resolve_framework(repo_path: impl AsRef<Path>, override_: Option<Framework>) -> Framework {
    match override_ {
        Some(framework) => {
            debug!("Using explicit framework: {}", framework);
            framework
        }
        None => detect_framework(repo_path),
    }
}

/// Unreadable or unparseable manifests count as absent
fn detect_js_runner(repo_path: &Path) -> Option<Framework> {
    let manifest_path = repo_path.join("package.json");
    let content = std::fs::read_to_string(&manifest_path).ok()?;

    let manifest: PackageManifest = match serde_json::from_str(&content) {
        Ok(manifest) => manifest,
        Err(e) => {
            debug!("Ignoring unparseable {}: {}", manifest_path.display(), e);
            return None;
        }
    };

    JS_RUNNERS
        .iter()
        .find(|(name, _)| manifest.has_dependency(name))
        .map(|(_, framework)| *framework)
}
