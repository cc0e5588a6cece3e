//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SketchRelayError;

/// Default HTTP/WebSocket port.
pub const DEFAULT_PORT: u16 = 3001;

/// Default delay before an empty room is reclaimed (one hour).
pub const DEFAULT_RECLAIM_AFTER_SECS: u64 = 3600;

/// Top-level Sketch Relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Allow cross-origin requests from any origin (default: true).
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Largest accepted WebSocket message in bytes (default: 1MB).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: None,
            cors: true,
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_max_frame_bytes() -> usize {
    1_048_576
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Seconds an empty room is kept before it is reclaimed.
    #[serde(default = "default_reclaim_after_secs")]
    pub reclaim_after_secs: u64,

    /// Optional cap on stored draw events per room. Oldest entries are dropped first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_history: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reclaim_after_secs: default_reclaim_after_secs(),
            max_history: None,
        }
    }
}

fn default_reclaim_after_secs() -> u64 {
    DEFAULT_RECLAIM_AFTER_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "sketch_relay_rooms=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

impl LoggingConfig {
    /// Build an `EnvFilter`-style directive string from the level and per-target filters.
    ///
    /// `fallback_level` is used when no level is configured.
    pub fn filter_directives(&self, fallback_level: &str) -> String {
        let level = self.level.as_deref().unwrap_or(fallback_level);
        std::iter::once(level)
            .chain(self.filters.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }

    pub fn is_stdout(&self) -> bool {
        self.output == "stdout"
    }
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> crate::error::Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| SketchRelayError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    ///
    /// A missing file yields the default configuration.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw)?;

        json5::from_str(&substituted).map_err(|e| SketchRelayError::Config(e.to_string()))
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json5")
    }

    /// Configured port, or the default.
    pub fn port(&self) -> u16 {
        self.server.as_ref().map(|s| s.port).unwrap_or(DEFAULT_PORT)
    }

    /// Configured bind address, or all interfaces.
    pub fn bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn cors_enabled(&self) -> bool {
        self.server.as_ref().map(|s| s.cors).unwrap_or(true)
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.server
            .as_ref()
            .map(|s| s.max_frame_bytes)
            .unwrap_or_else(default_max_frame_bytes)
    }

    /// How long an empty room survives before reclamation.
    pub fn reclaim_after(&self) -> Duration {
        let secs = self
            .relay
            .as_ref()
            .map(|r| r.reclaim_after_secs)
            .unwrap_or(DEFAULT_RECLAIM_AFTER_SECS);
        Duration::from_secs(secs)
    }

    pub fn max_history(&self) -> Option<usize> {
        self.relay.as_ref().and_then(|r| r.max_history)
    }

    /// Logging section, falling back to defaults.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(server) = &self.server {
            if server.port == 0 {
                errors.push("Server port cannot be 0".to_string());
            }
            if server.max_frame_bytes == 0 {
                errors.push("server.max_frame_bytes cannot be 0".to_string());
            }
        }

        if let Some(relay) = &self.relay {
            if relay.reclaim_after_secs == 0 {
                warnings.push(
                    "relay.reclaim_after_secs is 0: empty rooms are dropped immediately"
                        .to_string(),
                );
            }
            if relay.max_history == Some(0) {
                errors.push("relay.max_history cannot be 0 (omit it for unbounded)".to_string());
            }
        }

        if let Some(logging) = &self.logging {
            if !matches!(logging.format.as_str(), "plain" | "json") {
                errors.push(format!("Unknown log format: {}", logging.format));
            }
            if !matches!(logging.output.as_str(), "stderr" | "stdout") {
                errors.push(format!("Unknown log output: {}", logging.output));
            }
        }

        (warnings, errors)
    }
}

/// Base directory for Sketch Relay data: `~/.sketch_relay/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sketch_relay")
}
