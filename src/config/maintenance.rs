use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Recurring background jobs that run while the node is Ready.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MaintenanceConfig {
    /// Check cadence for the append-only log size, in seconds (0 disables)
    #[serde(default = "default_aof_check_interval_secs")]
    pub aof_check_interval_secs: u64,

    /// Rewrite the append-only log once it grows beyond this many bytes
    #[serde(default = "default_aof_rewrite_threshold_bytes")]
    pub aof_rewrite_threshold_bytes: u64,

    /// Check cadence for certificate rotation, in seconds (0 disables)
    #[serde(default = "default_cert_check_interval_secs")]
    pub cert_check_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            aof_check_interval_secs: default_aof_check_interval_secs(),
            aof_rewrite_threshold_bytes: default_aof_rewrite_threshold_bytes(),
            cert_check_interval_secs: default_cert_check_interval_secs(),
        }
    }
}

impl MaintenanceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.aof_check_interval_secs > 0 && self.aof_rewrite_threshold_bytes == 0 {
            return Err(invalid(
                "maintenance.aof_rewrite_threshold_bytes must be positive when the AOF check is enabled",
            ));
        }
        Ok(())
    }
}

fn default_aof_check_interval_secs() -> u64 {
    3600
}
fn default_aof_rewrite_threshold_bytes() -> u64 {
    // 1 GiB
    1 << 30
}
fn default_cert_check_interval_secs() -> u64 {
    300
}
