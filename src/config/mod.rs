//! Loader configuration
//!
//! One JSON document (`tables.json` by convention) describes where tables
//! come from, how long a source may take, whether the dev root is watched,
//! and how logging is filtered. Every section has defaults, so an empty
//! object `{}` is a valid config.
//!
//! Environment variables override the file:
//! - `TABLES_SOURCE_MODE`: `file_system` | `packaged` | `dev_overlay`
//! - `TABLES_DEV_ROOT`: dev fast-path directory
//! - `TABLES_SOURCE_TIMEOUT_MS`: per-source resolve timeout
//! - `TABLES_HOT_RELOAD`: `1`/`true` enables the dev root watcher
//! - `TABLES_LOG_LEVEL`: default tracing level (`RUST_LOG` still wins)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_DEV_ROOT, DEFAULT_HOT_RELOAD_DEBOUNCE, DEFAULT_SOURCE_TIMEOUT};
use crate::logging::{LogLevel, TracingConfig};
use crate::source::SourceMode;

pub const ENV_SOURCE_MODE: &str = "TABLES_SOURCE_MODE";
pub const ENV_DEV_ROOT: &str = "TABLES_DEV_ROOT";
pub const ENV_SOURCE_TIMEOUT_MS: &str = "TABLES_SOURCE_TIMEOUT_MS";
pub const ENV_HOT_RELOAD: &str = "TABLES_HOT_RELOAD";
pub const ENV_LOG_LEVEL: &str = "TABLES_LOG_LEVEL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value '{value}' for {name}: {reason}")]
    Env {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where table text comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub mode: SourceMode,
    pub dev_root: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::DevOverlay,
            dev_root: PathBuf::from(DEFAULT_DEV_ROOT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    pub source_timeout_ms: u64,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            source_timeout_ms: DEFAULT_SOURCE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl LoadSettings {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotReloadConfig {
    pub enabled: bool,
    pub debounce_ms: u64,
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: DEFAULT_HOT_RELOAD_DEBOUNCE.as_millis() as u64,
        }
    }
}

impl HotReloadConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub source: SourceConfig,
    pub load: LoadSettings,
    pub hot_reload: HotReloadConfig,
    pub logging: TracingConfig,
}

impl TableConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file (no environment overrides applied)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `TABLES_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (tests pass a map)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_SOURCE_MODE) {
            self.source.mode = value.parse().map_err(|reason| ConfigError::Env {
                name: ENV_SOURCE_MODE,
                value: value.clone(),
                reason,
            })?;
        }
        if let Some(value) = lookup(ENV_DEV_ROOT) {
            self.source.dev_root = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_SOURCE_TIMEOUT_MS) {
            self.load.source_timeout_ms =
                value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
                    name: ENV_SOURCE_TIMEOUT_MS,
                    value: value.clone(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(value) = lookup(ENV_HOT_RELOAD) {
            self.hot_reload.enabled = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError::Env {
                        name: ENV_HOT_RELOAD,
                        value,
                        reason: "expected a boolean".to_string(),
                    })
                }
            };
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.logging.default_level =
                value.parse::<LogLevel>().map_err(|reason| ConfigError::Env {
                    name: ENV_LOG_LEVEL,
                    value: value.clone(),
                    reason,
                })?;
        }
        Ok(())
    }
}
