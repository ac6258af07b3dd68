use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::ChildKind;
use crate::engine::InfoReport;
use crate::engine::ManagedProcess;
use crate::engine::MockEngineAdmin;
use crate::engine::MockEngineLauncher;
use crate::Result;

/// Ordered record of what fakes observed, e.g. `start engine`, `stop monitor`.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A child that runs until stopped, or exits right away with `exit_now`.
pub struct FakeProcess {
    pub kind: ChildKind,
    pub exit_now: bool,
    pub log: EventLog,
}

#[async_trait]
impl ManagedProcess for FakeProcess {
    fn kind(&self) -> ChildKind {
        self.kind
    }

    async fn exited(&mut self) -> Result<String> {
        if self.exit_now {
            Ok("exit status: 1".to_string())
        } else {
            futures::future::pending().await
        }
    }

    async fn stop(
        &mut self,
        _grace: Duration,
    ) -> Result<()> {
        self.log.lock().unwrap().push(format!("stop {}", self.kind.name()));
        Ok(())
    }
}

/// Launcher handing out [`FakeProcess`]es and logging each start.
pub fn fake_launcher(
    log: &EventLog,
    exit_now: bool,
) -> MockEngineLauncher {
    let log = log.clone();
    let mut launcher = MockEngineLauncher::new();
    launcher.expect_launch().returning(move |spec| {
        log.lock().unwrap().push(format!("start {}", spec.kind.name()));
        Ok(Box::new(FakeProcess {
            kind: spec.kind,
            exit_now,
            log: log.clone(),
        }) as Box<dyn ManagedProcess>)
    });
    launcher
}

/// An engine that accepts every admin command, reports `role` and has no
/// rewrite running.
pub fn compliant_engine(
    role: &'static str,
    log: &EventLog,
) -> MockEngineAdmin {
    let mut admin = MockEngineAdmin::new();
    admin.expect_ping().returning(|| Ok(()));
    admin.expect_info().returning(move |section| {
        Ok(InfoReport::parse(match section {
            "replication" => role,
            _ => "aof_enabled:1\naof_rewrite_in_progress:0\naof_rewrite_scheduled:0\n",
        }))
    });
    admin.expect_set_acl_user().returning(|_, _, _| Ok(()));
    let config_log = log.clone();
    admin.expect_config_set().returning(move |key, value| {
        config_log.lock().unwrap().push(format!("config {key} {value}"));
        Ok(())
    });
    admin.expect_config_rewrite().returning(|| Ok(()));
    let checkpoint_log = log.clone();
    admin.expect_bgrewriteaof().returning(move || {
        checkpoint_log.lock().unwrap().push("checkpoint".to_string());
        Ok(())
    });
    let shutdown_log = log.clone();
    admin.expect_shutdown().returning(move || {
        shutdown_log.lock().unwrap().push("shutdown".to_string());
        Ok(())
    });
    admin
}
