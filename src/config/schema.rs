//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dev
//! server. All types derive Serde traits for deserialization from TOML and
//! every field has a default, so an empty file is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the dev server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DevServerConfig {
    /// Listener configuration (host, starting port, retry delay).
    pub listener: ListenerConfig,

    /// Route source discovery and reload settings.
    pub routes: RoutesConfig,

    /// Request dispatch settings.
    pub dispatch: DispatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or IP to bind.
    pub host: String,

    /// First port to try; successive ports are tried while it is in use.
    pub port: u16,

    /// Delay before retrying on the next port, in milliseconds.
    pub retry_delay_ms: u64,
}

impl ListenerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            retry_delay_ms: 500,
        }
    }
}

/// Route sources configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Directory searched recursively for route manifests.
    pub dir: PathBuf,

    /// Quiet window that collapses bursts of change events, in milliseconds.
    pub debounce_ms: u64,

    /// Serve an empty table instead of refusing to start when the initial
    /// build fails.
    pub allow_empty_on_error: bool,
}

impl RoutesConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("routes"),
            debounce_ms: 100,
            allow_empty_on_error: false,
        }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on handler execution, in milliseconds. Unbounded if unset.
    pub handler_timeout_ms: Option<u64>,
}

impl DispatchConfig {
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
