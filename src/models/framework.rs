//! Test framework models
//!
//! Defines the detected test ecosystems and their seed conventions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported test frameworks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    Python,
    Go,
    TypescriptJest,
    TypescriptVitest,
    JavascriptMocha,
    Unknown,
}

impl Framework {
    /// Get framework tag as used on the wire
    pub fn tag(&self) -> &'static str {
        match self {
            Framework::Python => "python",
            Framework::Go => "go",
            Framework::TypescriptJest => "typescript-jest",
            Framework::TypescriptVitest => "typescript-vitest",
            Framework::JavascriptMocha => "javascript-mocha",
            Framework::Unknown => "unknown",
        }
    }

    /// Environment variable that carries the random seed into the test process
    pub fn seed_env_var(&self) -> &'static str {
        match self {
            Framework::Python => "TEST_SEED",
            Framework::Go => "GO_TEST_SEED",
            Framework::TypescriptJest => "JEST_SEED",
            Framework::TypescriptVitest => "VITE_TEST_SEED",
            Framework::JavascriptMocha => "MOCHA_SEED",
            Framework::Unknown => "TEST_SEED",
        }
    }

    /// Get all known frameworks (excluding `unknown`)
    pub fn all() -> Vec<Framework> {
        vec![
            Framework::Python,
            Framework::Go,
            Framework::TypescriptJest,
            Framework::TypescriptVitest,
            Framework::JavascriptMocha,
        ]
    }

    /// Resolve a caller-supplied override
    ///
    /// Only an exact tag selects a framework. Anything else, including
    /// differently cased or padded tags, becomes `Unknown`.
    pub fn from_override(s: &str) -> Framework {
        Self::all()
            .into_iter()
            .find(|framework| framework.tag() == s)
            .unwrap_or(Framework::Unknown)
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}
