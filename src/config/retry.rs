use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Retry policy value object shared by every blocking wait.
///
/// A policy is bounded when it carries a deadline, an attempt cap, or both;
/// whichever is hit first ends the loop.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed delay between attempts (unit: milliseconds)
    pub interval_ms: u64,

    /// Maximum number of attempts (0 means unlimited)
    #[serde(default)]
    pub max_attempts: u32,

    /// Overall time budget (unit: milliseconds, 0 means no deadline)
    #[serde(default)]
    pub deadline_ms: u64,
}

impl RetryPolicy {
    pub const fn unbounded(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            max_attempts: 0,
            deadline_ms: 0,
        }
    }

    pub const fn with_attempts(
        interval_ms: u64,
        max_attempts: u32,
    ) -> Self {
        Self {
            interval_ms,
            max_attempts,
            deadline_ms: 0,
        }
    }

    pub const fn with_deadline(
        interval_ms: u64,
        deadline_ms: u64,
    ) -> Self {
        Self {
            interval_ms,
            max_attempts: 0,
            deadline_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms))
    }

    pub fn attempts_cap(&self) -> Option<u32> {
        (self.max_attempts > 0).then_some(self.max_attempts)
    }

    pub fn is_bounded(&self) -> bool {
        self.max_attempts > 0 || self.deadline_ms > 0
    }
}

/// Divide strategies by lifecycle step
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    // Resolving and pinging a peer (fatal on deadline)
    #[serde(default = "default_peer_resolution")]
    pub peer_resolution: RetryPolicy,

    // Re-introducing a stale peer (best effort)
    #[serde(default = "default_peer_reintroduction")]
    pub peer_reintroduction: RetryPolicy,

    // Non-bootstrap nodes waiting for the monitor to know a primary
    #[serde(default = "default_primary_discovery")]
    pub primary_discovery: RetryPolicy,

    // Bootstrap node asking the monitor before self-electing
    #[serde(default = "default_bootstrap_discovery")]
    pub bootstrap_discovery: RetryPolicy,

    // Non-creator shard members waiting for the topology to exist
    #[serde(default = "default_creator_wait")]
    pub creator_wait: RetryPolicy,

    // Adding this node to an existing topology
    #[serde(default = "default_cluster_join")]
    pub cluster_join: RetryPolicy,

    // Engine accepting connections after launch
    #[serde(default = "default_engine_ready")]
    pub engine_ready: RetryPolicy,

    // Final durability checkpoint on shutdown (fatal on deadline)
    #[serde(default = "default_checkpoint_wait")]
    pub checkpoint_wait: RetryPolicy,

    // Manual failover on shutdown (best effort)
    #[serde(default = "default_failover_wait")]
    pub failover_wait: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            peer_resolution: default_peer_resolution(),
            peer_reintroduction: default_peer_reintroduction(),
            primary_discovery: default_primary_discovery(),
            bootstrap_discovery: default_bootstrap_discovery(),
            creator_wait: default_creator_wait(),
            cluster_join: default_cluster_join(),
            engine_ready: default_engine_ready(),
            checkpoint_wait: default_checkpoint_wait(),
            failover_wait: default_failover_wait(),
        }
    }
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        for (name, policy) in [
            ("peer_resolution", &self.peer_resolution),
            ("peer_reintroduction", &self.peer_reintroduction),
            ("primary_discovery", &self.primary_discovery),
            ("bootstrap_discovery", &self.bootstrap_discovery),
            ("creator_wait", &self.creator_wait),
            ("cluster_join", &self.cluster_join),
            ("engine_ready", &self.engine_ready),
            ("checkpoint_wait", &self.checkpoint_wait),
            ("failover_wait", &self.failover_wait),
        ] {
            if policy.interval_ms == 0 {
                return Err(invalid(format!("retry.{name}.interval_ms must be positive")));
            }
        }

        // Shutdown runs under the orchestrator's grace period
        for (name, policy) in [
            ("checkpoint_wait", &self.checkpoint_wait),
            ("failover_wait", &self.failover_wait),
            ("bootstrap_discovery", &self.bootstrap_discovery),
        ] {
            if !policy.is_bounded() {
                return Err(invalid(format!(
                    "retry.{name} must set max_attempts or deadline_ms"
                )));
            }
        }
        Ok(())
    }
}

fn default_peer_resolution() -> RetryPolicy {
    RetryPolicy::with_deadline(5000, 300_000)
}
fn default_peer_reintroduction() -> RetryPolicy {
    RetryPolicy::with_attempts(2000, 3)
}
fn default_primary_discovery() -> RetryPolicy {
    RetryPolicy::unbounded(5000)
}
fn default_bootstrap_discovery() -> RetryPolicy {
    RetryPolicy::with_attempts(5000, 3)
}
fn default_creator_wait() -> RetryPolicy {
    RetryPolicy::unbounded(5000)
}
fn default_cluster_join() -> RetryPolicy {
    RetryPolicy::with_attempts(10_000, 5)
}
fn default_engine_ready() -> RetryPolicy {
    RetryPolicy::with_deadline(1000, 60_000)
}
fn default_checkpoint_wait() -> RetryPolicy {
    RetryPolicy::with_deadline(1000, 300_000)
}
fn default_failover_wait() -> RetryPolicy {
    RetryPolicy::with_attempts(2000, 30)
}
