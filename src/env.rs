//! Deployment environment tag
//!
//! The tag is read once at startup and decides whether the gate fulfills
//! calls from caller-supplied fixtures (demo mode) or over the network.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Substring that marks an environment as demo mode (case-insensitive).
const DEMO_MARKER: &str = "lovable";

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppEnv {
    /// Isolated preview, development build
    LovableDev,
    /// Isolated preview
    Lovable,
    /// Local development
    #[default]
    Development,
    Staging,
    Production,
}

impl AppEnv {
    /// All accepted environment tags
    pub const ALL: [AppEnv; 5] = [
        AppEnv::LovableDev,
        AppEnv::Lovable,
        AppEnv::Development,
        AppEnv::Staging,
        AppEnv::Production,
    ];

    /// Canonical name as it appears in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::LovableDev => "lovable-dev",
            AppEnv::Lovable => "lovable",
            AppEnv::Development => "development",
            AppEnv::Staging => "staging",
            AppEnv::Production => "production",
        }
    }

    /// Check if calls in this environment are served from mock payloads
    pub fn is_demo(&self) -> bool {
        self.as_str().to_ascii_lowercase().contains(DEMO_MARKER)
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppEnv {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AppEnv::ALL
            .into_iter()
            .find(|env| env.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                FetchError::Configuration(format!(
                    "unknown environment '{}' (expected one of: lovable-dev, lovable, development, staging, production)",
                    s
                ))
            })
    }
}
