use std::fmt;

use tracing::info;

use super::QuorumMonitor;
use crate::CoordinatorConfig;
use crate::Endpoint;
use crate::Result;

/// What the monitor is told about the group this node leads.
#[derive(Clone, PartialEq, Eq)]
pub struct MonitorRegistration {
    pub group: String,
    pub primary: Endpoint,
    pub quorum: u32,
    pub down_after_ms: u64,
    pub failover_timeout_ms: u64,
    pub parallel_syncs: u32,
    pub auth_pass: String,
}

impl fmt::Debug for MonitorRegistration {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("MonitorRegistration")
            .field("group", &self.group)
            .field("primary", &self.primary)
            .field("quorum", &self.quorum)
            .field("down_after_ms", &self.down_after_ms)
            .field("failover_timeout_ms", &self.failover_timeout_ms)
            .finish()
    }
}

impl MonitorRegistration {
    pub fn from_config(
        config: &CoordinatorConfig,
        primary: Endpoint,
    ) -> Self {
        Self {
            group: config.monitor.group_name.clone(),
            primary,
            quorum: config.monitor.quorum,
            down_after_ms: config.monitor.down_after_ms,
            failover_timeout_ms: config.monitor.failover_timeout_ms,
            parallel_syncs: config.monitor.parallel_syncs,
            auth_pass: config.credentials.admin_password.clone(),
        }
    }

    /// `SENTINEL SET` pairs pushed after the group is known.
    pub fn tunables(&self) -> Vec<(&'static str, String)> {
        vec![
            ("auth-pass", self.auth_pass.clone()),
            ("down-after-milliseconds", self.down_after_ms.to_string()),
            ("failover-timeout", self.failover_timeout_ms.to_string()),
            ("parallel-syncs", self.parallel_syncs.to_string()),
        ]
    }

    /// Registers the group (idempotent) and pushes every tunable. Any
    /// rejection other than an existing registration is returned.
    pub async fn apply(
        &self,
        monitor: &dyn QuorumMonitor,
    ) -> Result<()> {
        monitor.monitor(&self.group, &self.primary, self.quorum).await?;
        for (option, value) in self.tunables() {
            monitor.set(&self.group, option, &value).await?;
        }
        info!(
            "group {} registered at {} with quorum {}",
            self.group, self.primary, self.quorum
        );
        Ok(())
    }
}
