use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::Supervisor;
use crate::engine::ChildKind;
use crate::engine::EngineAdmin;
use crate::metrics::SHUTDOWN_OUTCOMES;
use crate::monitor::MonitorPeer;
use crate::monitor::QuorumMonitor;
use crate::utils::async_task::retry_until;
use crate::CoordinationError;
use crate::Error;
use crate::Result;
use crate::RetryPolicy;
use crate::Role;

fn record(
    step: &str,
    outcome: &str,
) {
    SHUTDOWN_OUTCOMES.with_label_values(&[step, outcome]).inc();
}

/// Ordered shutdown: hand off the primary role, checkpoint, stop the engine,
/// then clear the monitor's view of this node.
pub struct Drainer {
    admin: Arc<dyn EngineAdmin>,
    monitor: Option<Arc<dyn QuorumMonitor>>,
    group: String,
    failover_wait: RetryPolicy,
    checkpoint_wait: RetryPolicy,
    stop_grace: Duration,
}

impl Drainer {
    pub fn new(
        admin: Arc<dyn EngineAdmin>,
        monitor: Option<Arc<dyn QuorumMonitor>>,
        group: impl Into<String>,
        failover_wait: RetryPolicy,
        checkpoint_wait: RetryPolicy,
        stop_grace: Duration,
    ) -> Self {
        Self {
            admin,
            monitor,
            group: group.into(),
            failover_wait,
            checkpoint_wait,
            stop_grace,
        }
    }

    /// Runs every step. Only an unfinished checkpoint is fatal, and it
    /// leaves the engine running.
    #[instrument(skip(self, supervisor))]
    pub async fn drain(
        &self,
        role: Role,
        supervisor: &mut Supervisor,
    ) -> Result<()> {
        if role == Role::Primary {
            self.hand_off().await;
        }

        self.checkpoint().await?;

        match self.admin.shutdown().await {
            Ok(()) => record("shutdown", "ok"),
            Err(e) => {
                record("shutdown", "failed");
                warn!("engine refused shutdown: {e}");
            }
        }
        supervisor.stop(ChildKind::Engine, self.stop_grace).await?;

        self.forget_node().await;
        supervisor.stop(ChildKind::Monitor, self.stop_grace).await?;
        Ok(())
    }

    /// Asks the monitor to fail over and waits for this engine to stop
    /// acting as primary. Skipped when the monitor sees no replica that is
    /// up. Giving up is not fatal.
    pub async fn hand_off(&self) -> bool {
        let Some(monitor) = self.monitor.as_deref() else {
            return false;
        };
        match monitor.replicas(&self.group).await {
            Ok(replicas) if replicas.iter().all(MonitorPeer::is_down) => {
                record("failover", "no_replica");
                info!("no healthy replica of {} to promote, skipping failover", self.group);
                return false;
            }
            Ok(_) => {}
            Err(e) => warn!("replica list of {} unavailable, attempting failover: {e}", self.group),
        }
        if let Err(e) = monitor.failover(&self.group).await {
            record("failover", "rejected");
            warn!("monitor refused failover of {}: {e}", self.group);
            return false;
        }

        let admin = self.admin.as_ref();
        let demoted = retry_until("failover wait", &self.failover_wait, |_| async move {
            if admin.info("replication").await?.is_primary() {
                Err(Error::from(CoordinationError::RoleUndetermined(
                    "still primary".into(),
                )))
            } else {
                Ok(())
            }
        })
        .await;

        match demoted {
            Ok(()) => {
                record("failover", "ok");
                info!("primary role handed off");
                true
            }
            Err(e) => {
                record("failover", "gave_up");
                warn!("failover not observed after {} attempts, shutting down anyway", e.attempts);
                false
            }
        }
    }

    /// Forces an append-only log rewrite and waits for it to finish.
    pub async fn checkpoint(&self) -> Result<()> {
        self.admin.bgrewriteaof().await?;

        let admin = self.admin.as_ref();
        let finished = retry_until("checkpoint wait", &self.checkpoint_wait, |_| async move {
            if admin.info("persistence").await?.aof_rewrite_active() {
                Err(Error::from(CoordinationError::CheckpointIncomplete {
                    waited: Duration::ZERO,
                }))
            } else {
                Ok(())
            }
        })
        .await;

        match finished {
            Ok(()) => {
                record("checkpoint", "ok");
                info!("final checkpoint complete");
                Ok(())
            }
            Err(e) => {
                record("checkpoint", "incomplete");
                Err(CoordinationError::CheckpointIncomplete { waited: e.elapsed }.into())
            }
        }
    }

    /// Best effort: persist the monitor's state and drop what it learned
    /// about this node.
    pub async fn forget_node(&self) {
        let Some(monitor) = self.monitor.as_deref() else {
            return;
        };
        if let Err(e) = monitor.flush_config().await {
            warn!("monitor flush failed: {e}");
        }
        match monitor.reset(&self.group).await {
            Ok(groups) => {
                record("monitor_reset", "ok");
                info!("monitor reset {groups} group(s)");
            }
            Err(e) => {
                record("monitor_reset", "failed");
                warn!("monitor reset failed: {e}");
            }
        }
    }
}
