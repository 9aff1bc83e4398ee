//! # Controller Configuration
//!
//! Process-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_METRICS_PORT, DEFAULT_WATCH_BACKOFF_MAX_MS, DEFAULT_WATCH_BACKOFF_START_MS,
};
use std::time::Duration;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Serve metrics and probes at all
    pub enable_metrics: bool,
    /// Log format (json, text)
    pub log_format: LogFormat,
    /// Watch re-open backoff starting value (milliseconds)
    pub watch_backoff_start_ms: u64,
    /// Watch re-open backoff maximum value (milliseconds)
    pub watch_backoff_max_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            enable_metrics: true,
            log_format: LogFormat::Text,
            watch_backoff_start_ms: DEFAULT_WATCH_BACKOFF_START_MS,
            watch_backoff_max_ms: DEFAULT_WATCH_BACKOFF_MAX_MS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            metrics_port: env_var_or_default("METRICS_PORT", defaults.metrics_port),
            enable_metrics: env_var_or_default_bool("ENABLE_METRICS", defaults.enable_metrics),
            log_format: env_var_or_default("LOG_FORMAT", defaults.log_format),
            watch_backoff_start_ms: env_var_or_default(
                "WATCH_BACKOFF_START_MS",
                defaults.watch_backoff_start_ms,
            ),
            watch_backoff_max_ms: env_var_or_default(
                "WATCH_BACKOFF_MAX_MS",
                defaults.watch_backoff_max_ms,
            ),
        }
    }

    /// Get watch backoff start duration
    #[must_use]
    pub fn watch_backoff_start(&self) -> Duration {
        Duration::from_millis(self.watch_backoff_start_ms)
    }

    /// Get watch backoff max duration
    #[must_use]
    pub fn watch_backoff_max(&self) -> Duration {
        Duration::from_millis(self.watch_backoff_max_ms)
    }
}

/// Read environment variable or return default
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}
