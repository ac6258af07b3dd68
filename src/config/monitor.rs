use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use super::TopologyMode;
use crate::Result;

/// Quorum monitor (sentinel) connection and tuning parameters.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Replicated topologies only; ignored otherwise
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Host of the monitor service
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Name of the monitored primary group
    #[serde(default = "default_group_name")]
    pub group_name: String,

    /// Votes needed to agree the primary is down
    #[serde(default = "default_quorum")]
    pub quorum: u32,

    #[serde(default = "default_down_after_ms")]
    pub down_after_ms: u64,

    #[serde(default = "default_failover_timeout_ms")]
    pub failover_timeout_ms: u64,

    #[serde(default = "default_parallel_syncs")]
    pub parallel_syncs: u32,

    /// Run a monitor process next to the engine and supervise it
    #[serde(default)]
    pub run_local: bool,

    #[serde(default = "default_binary")]
    pub binary: String,

    /// Monitor configuration file name, relative to the node data directory
    #[serde(default = "default_config_file")]
    pub config_file: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_host(),
            port: default_port(),
            group_name: default_group_name(),
            quorum: default_quorum(),
            down_after_ms: default_down_after_ms(),
            failover_timeout_ms: default_failover_timeout_ms(),
            parallel_syncs: default_parallel_syncs(),
            run_local: false,
            binary: default_binary(),
            config_file: default_config_file(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(
        &self,
        topology: TopologyMode,
    ) -> Result<()> {
        if !self.is_active(topology) {
            return Ok(());
        }

        if self.group_name.trim().is_empty() || self.group_name.contains(char::is_whitespace) {
            return Err(invalid(format!(
                "monitor.group_name {:?} must be a single non-empty word",
                self.group_name
            )));
        }

        if self.quorum == 0 {
            return Err(invalid("monitor.quorum must be at least 1"));
        }

        if self.port == 0 {
            return Err(invalid("monitor.port must be non-zero"));
        }

        if self.down_after_ms == 0 || self.failover_timeout_ms == 0 {
            return Err(invalid(
                "monitor.down_after_ms and monitor.failover_timeout_ms must be positive",
            ));
        }
        Ok(())
    }

    /// A monitor takes part only in replicated deployments.
    pub fn is_active(
        &self,
        topology: TopologyMode,
    ) -> bool {
        self.enabled && topology == TopologyMode::Replicated
    }
}

fn default_enabled() -> bool {
    true
}
fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    26379
}
fn default_group_name() -> String {
    "master".into()
}
fn default_quorum() -> u32 {
    2
}
fn default_down_after_ms() -> u64 {
    1000
}
fn default_failover_timeout_ms() -> u64 {
    1000
}
fn default_parallel_syncs() -> u32 {
    1
}
fn default_binary() -> String {
    "redis-server".into()
}
fn default_config_file() -> String {
    "sentinel.conf".into()
}
