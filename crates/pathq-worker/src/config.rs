//! Worker configuration.

use std::path::PathBuf;

/// Worker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Root directory for plans and stage artifacts
    pub log_dir: PathBuf,
    /// Query catalogue file
    pub catalog_path: PathBuf,
    /// Upper bound on concurrent quality samples, overriding the model config
    pub max_sampling_parallel: usize,
    /// Keep plans that miss the accuracy bound instead of failing
    pub accept_degraded: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            catalog_path: PathBuf::from("catalog.json"),
            max_sampling_parallel: 4,
            accept_degraded: false,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            log_dir: lookup("PATHQ_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            catalog_path: lookup("PATHQ_CATALOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_path),
            max_sampling_parallel: lookup("PATHQ_MAX_SAMPLING_PARALLEL")
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_sampling_parallel),
            accept_degraded: lookup("PATHQ_ACCEPT_DEGRADED")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.accept_degraded),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
