use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{common::require_file_exists, metric::MetricKind, remote::RetryPolicy};

pub const DEFAULT_TOKEN_ENV: &str = "URBANHEAT_TOKEN";

/// Settings loaded from an optional TOML file; every key has a default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: BackendConfig,
    pub analysis: AnalysisConfig,
}

/// Remote image-collection backend connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub endpoint: Option<String>,
    pub token_env: String, // Name of the environment variable holding the bearer token
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_secs: 30,
            max_attempts: 4,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub top_n: usize,         // Number of hotspots that receive an intervention
    pub rank_by: MetricKind,  // Metric used to rank hotspots
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { top_n: 3, rank_by: MetricKind::Temperature }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("[config] Failed to parse configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        require_file_exists(path)?;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("[config] in {}", path.display()))
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }
}
