//! Structured logging for the table loader.
//!
//! Thin layer over `tracing` / `tracing-subscriber`:
//! - Level-based filtering with per-module overrides
//! - `RUST_LOG` always wins over the configured filter
//! - Idempotent initialization (tests and the binary may both call it)

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Log level accepted in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub default_level: LogLevel,
    pub module_filters: Vec<(String, LogLevel)>,
    pub show_targets: bool,
    pub show_thread_ids: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            module_filters: vec![
                ("tower_tables::parser".to_string(), LogLevel::Warn),
                ("tower_tables::loader".to_string(), LogLevel::Info),
                ("tower_tables::hotreload".to_string(), LogLevel::Info),
                ("notify".to_string(), LogLevel::Warn),
            ],
            show_targets: true,
            show_thread_ids: false,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    pub fn to_env_filter_string(&self) -> String {
        let mut parts = vec![self.default_level.as_str().to_string()];
        for (module, level) in &self.module_filters {
            parts.push(format!("{}={}", module, level.as_str()));
        }
        parts.join(",")
    }
}

static TRACING_INIT: Once = Once::new();

/// Initialize tracing with default settings
pub fn init_tracing_default() {
    init_tracing(&TracingConfig::default());
}

/// Initialize tracing with the given config. First call wins.
pub fn init_tracing(config: &TracingConfig) {
    let filter_str = config.to_env_filter_string();
    let config = config.clone();
    TRACING_INIT.call_once(move || {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.show_targets)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .compact();

        // A host application may already own the global subscriber
        let _ = subscriber.try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(" info ".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_env_filter_string() {
        let filter = TracingConfig::default().to_env_filter_string();
        assert!(filter.starts_with("info"));
        assert!(filter.contains("tower_tables::parser=warn"));
        assert!(filter.contains("tower_tables::loader=info"));
    }

    #[test]
    fn test_tracing_config_json_uses_lowercase_levels() {
        let config = TracingConfig {
            default_level: LogLevel::Debug,
            module_filters: vec![("my_module".to_string(), LogLevel::Trace)],
            ..TracingConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"debug\""));
        assert!(json.contains("\"trace\""));

        let restored: TracingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.default_level, LogLevel::Debug);
        assert_eq!(restored.to_env_filter_string(), "debug,my_module=trace");
    }

    #[test]
    fn test_tracing_config_partial_json_fills_defaults() {
        let restored: TracingConfig = serde_json::from_str(r#"{"default_level":"warn"}"#).unwrap();
        assert_eq!(restored.default_level, LogLevel::Warn);
        assert!(restored.show_targets);
        assert!(!restored.module_filters.is_empty());
    }

    #[test]
    fn test_init_tracing_idempotent() {
        init_tracing_default();
        init_tracing_default();
        init_tracing(&TracingConfig::default());
    }
}
