use std::sync::Arc;
use std::time::Duration;

use futures::future::pending;
use tracing::info;
use tracing::warn;

use crate::engine::ChildKind;
use crate::engine::EngineLauncher;
use crate::engine::LaunchSpec;
use crate::engine::ManagedProcess;
use crate::CoordinatorConfig;
use crate::Result;

/// Engine launch: `<engine_binary> <config file>`.
pub fn engine_launch_spec(config: &CoordinatorConfig) -> LaunchSpec {
    LaunchSpec {
        kind: ChildKind::Engine,
        program: config.node.engine_binary.clone(),
        args: vec![config.node.engine_config_path().display().to_string()],
    }
}

/// Co-located monitor launch: `<binary> <config file> --sentinel`.
pub fn monitor_launch_spec(config: &CoordinatorConfig) -> LaunchSpec {
    LaunchSpec {
        kind: ChildKind::Monitor,
        program: config.monitor.binary.clone(),
        args: vec![
            config.node.data_dir.join(&config.monitor.config_file).display().to_string(),
            "--sentinel".to_string(),
        ],
    }
}

/// Owns the child processes. Stopping walks them in one fixed order: engine
/// first, then the monitor.
pub struct Supervisor {
    launcher: Arc<dyn EngineLauncher>,
    engine: Option<Box<dyn ManagedProcess>>,
    monitor: Option<Box<dyn ManagedProcess>>,
}

impl Supervisor {
    pub fn new(launcher: Arc<dyn EngineLauncher>) -> Self {
        Self {
            launcher,
            engine: None,
            monitor: None,
        }
    }

    pub async fn start(
        &mut self,
        spec: LaunchSpec,
    ) -> Result<()> {
        let kind = spec.kind;
        let child = self.launcher.launch(spec).await?;
        match kind {
            ChildKind::Engine => self.engine = Some(child),
            ChildKind::Monitor => self.monitor = Some(child),
        }
        Ok(())
    }

    pub fn is_running(
        &self,
        kind: ChildKind,
    ) -> bool {
        match kind {
            ChildKind::Engine => self.engine.is_some(),
            ChildKind::Monitor => self.monitor.is_some(),
        }
    }

    /// Resolves when any supervised child exits; never resolves without
    /// children.
    pub async fn exited(&mut self) -> (ChildKind, Result<String>) {
        match (self.engine.as_mut(), self.monitor.as_mut()) {
            (Some(engine), Some(monitor)) => tokio::select! {
                status = engine.exited() => (ChildKind::Engine, status),
                status = monitor.exited() => (ChildKind::Monitor, status),
            },
            (Some(engine), None) => (ChildKind::Engine, engine.exited().await),
            (None, Some(monitor)) => (ChildKind::Monitor, monitor.exited().await),
            (None, None) => pending().await,
        }
    }

    /// Stops one child, waiting up to `grace` for it to exit on its own.
    pub async fn stop(
        &mut self,
        kind: ChildKind,
        grace: Duration,
    ) -> Result<()> {
        let child = match kind {
            ChildKind::Engine => self.engine.take(),
            ChildKind::Monitor => self.monitor.take(),
        };
        if let Some(mut child) = child {
            child.stop(grace).await?;
            info!("{} stopped", kind.name());
        }
        Ok(())
    }

    /// Engine first, then the monitor. Failures are logged and the walk
    /// continues.
    pub async fn stop_all(
        &mut self,
        grace: Duration,
    ) {
        for kind in [ChildKind::Engine, ChildKind::Monitor] {
            if let Err(e) = self.stop(kind, grace).await {
                warn!("stopping {} failed: {e}", kind.name());
            }
        }
    }
}
