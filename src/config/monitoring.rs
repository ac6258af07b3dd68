use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Health endpoints consumed by the orchestrator (startup, readiness, liveness).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthConfig {
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,

    #[serde(default = "default_health_port")]
    pub port: u16,

    /// Per-check timeout talking to the engine
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            port: default_health_port(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl HealthConfig {
    /// Validates health endpoint configuration
    /// # Errors
    /// Returns a config error when enabled with port 0 or a privileged port
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            if self.port == 0 {
                return Err(invalid("health.port cannot be 0 when enabled"));
            }

            // Check privileged ports (requires root)
            if self.port < 1024 {
                return Err(invalid(format!(
                    "health.port {} is a privileged port (requires root)",
                    self.port
                )));
            }
        } else {
            // Warn about unused port configuration
            #[cfg(debug_assertions)]
            if self.port != default_health_port() {
                tracing::warn!("health.port configured to {} but health endpoints are disabled", self.port);
            }
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Directory for the coordinator log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_health_enabled() -> bool {
    true
}
fn default_health_port() -> u16 {
    8081
}
fn default_probe_timeout_ms() -> u64 {
    2000
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("/data/logs")
}
fn default_log_level() -> String {
    "info".into()
}
