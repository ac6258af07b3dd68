use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::watch;
use tracing::info;

use crate::metrics::LIFECYCLE_PHASE;
use crate::RoleDecision;

/// Where the node is in its life. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LifecyclePhase {
    #[default]
    Starting,
    ConfiguringEngine,
    EngineRunning,
    RegisteringWithMonitor,
    Formation,
    Ready,
    Draining,
    Stopped,
}

impl LifecyclePhase {
    pub fn ordinal(self) -> i64 {
        self as i64
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Starting => "starting",
            LifecyclePhase::ConfiguringEngine => "configuring-engine",
            LifecyclePhase::EngineRunning => "engine-running",
            LifecyclePhase::RegisteringWithMonitor => "registering-with-monitor",
            LifecyclePhase::Formation => "formation",
            LifecyclePhase::Ready => "ready",
            LifecyclePhase::Draining => "draining",
            LifecyclePhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared view of the node for the health endpoints.
pub struct NodeStatus {
    phase: watch::Sender<LifecyclePhase>,
    decision: ArcSwapOption<RoleDecision>,
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStatus {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(LifecyclePhase::Starting);
        Self {
            phase,
            decision: ArcSwapOption::empty(),
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    pub fn set_phase(
        &self,
        phase: LifecyclePhase,
    ) {
        let previous = self.phase.send_replace(phase);
        LIFECYCLE_PHASE.set(phase.ordinal());
        if previous != phase {
            info!("lifecycle: {previous} -> {phase}");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    pub fn decision(&self) -> Option<Arc<RoleDecision>> {
        self.decision.load_full()
    }

    pub fn set_decision(
        &self,
        decision: RoleDecision,
    ) {
        self.decision.store(Some(Arc::new(decision)));
    }
}
