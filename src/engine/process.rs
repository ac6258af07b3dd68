use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::constants::ENGINE_LOG_TARGET;
use crate::constants::MONITOR_LOG_TARGET;
use crate::ProcessError;
use crate::Result;

const TAIL_DRAIN: Duration = Duration::from_secs(2);

/// Which child a launch request is for; selects the log target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Engine,
    Monitor,
}

impl ChildKind {
    pub fn name(self) -> &'static str {
        match self {
            ChildKind::Engine => "engine",
            ChildKind::Monitor => "monitor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub kind: ChildKind,
    pub program: String,
    pub args: Vec<String>,
}

/// A supervised child process.
#[async_trait]
pub trait ManagedProcess: Send {
    fn kind(&self) -> ChildKind;

    /// Resolves when the process exits, with a printable status.
    async fn exited(&mut self) -> Result<String>;

    /// Waits up to `grace` for a voluntary exit, then kills.
    async fn stop(
        &mut self,
        grace: Duration,
    ) -> Result<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(
        &self,
        spec: LaunchSpec,
    ) -> Result<Box<dyn ManagedProcess>>;
}

/// Spawns real OS processes with `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct ProcessLauncher;

#[async_trait]
impl EngineLauncher for ProcessLauncher {
    async fn launch(
        &self,
        spec: LaunchSpec,
    ) -> Result<Box<dyn ManagedProcess>> {
        Ok(Box::new(ChildProcess::spawn(&spec)?))
    }
}

pub struct ChildProcess {
    kind: ChildKind,
    child: Child,
    tails: Vec<JoinHandle<()>>,
}

impl ChildProcess {
    pub fn spawn(spec: &LaunchSpec) -> Result<Self> {
        let name = spec.kind.name();
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                name: name.to_string(),
                source,
            })?;
        info!("{} started: {} (pid {:?})", name, spec.program, child.id());

        let mut tails = Vec::new();
        if let Some(out) = child.stdout.take() {
            tails.push(tokio::spawn(tail_lines(spec.kind, out)));
        }
        if let Some(err) = child.stderr.take() {
            tails.push(tokio::spawn(tail_lines(spec.kind, err)));
        }

        Ok(Self {
            kind: spec.kind,
            child,
            tails,
        })
    }
}

#[async_trait]
impl ManagedProcess for ChildProcess {
    fn kind(&self) -> ChildKind {
        self.kind
    }

    async fn exited(&mut self) -> Result<String> {
        let status = self.child.wait().await.map_err(|e| ProcessError::UnexpectedExit {
            name: self.kind.name().to_string(),
            status: e.to_string(),
        })?;
        Ok(status.to_string())
    }

    async fn stop(
        &mut self,
        grace: Duration,
    ) -> Result<()> {
        let name = self.kind.name();
        match timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => info!("{name} exited with {status}"),
            Ok(Err(e)) => warn!("waiting on {name} failed: {e}"),
            Err(_) => {
                warn!("{name} still running after {grace:?}, killing");
                if let Err(e) = self.child.kill().await {
                    warn!("kill {name} failed: {e}");
                }
            }
        }
        // Output pipes close with the process; drain what is left.
        for tail in self.tails.drain(..) {
            if timeout(TAIL_DRAIN, tail).await.is_err() {
                debug!("{name} output still open after exit");
            }
        }
        Ok(())
    }
}

/// Re-emits child output line by line under the child's log target.
async fn tail_lines<R>(
    kind: ChildKind,
    reader: R,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match kind {
                ChildKind::Engine => info!(target: ENGINE_LOG_TARGET, "{line}"),
                ChildKind::Monitor => info!(target: MONITOR_LOG_TARGET, "{line}"),
            },
            Ok(None) => break,
            Err(e) => {
                debug!("{} output closed: {e}", kind.name());
                break;
            }
        }
    }
}
