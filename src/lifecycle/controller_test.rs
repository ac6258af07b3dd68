use std::sync::Arc;

use tempfile::tempdir;
use tokio::sync::watch;

use super::*;
use crate::formation::MockClusterOps;
use crate::monitor::MockQuorumMonitor;
use crate::role::MockPeerRoleProbe;
use crate::test_utils::compliant_engine;
use crate::test_utils::event_log;
use crate::test_utils::events;
use crate::test_utils::fake_launcher;
use crate::test_utils::healthy_probe;
use crate::test_utils::indexed_lookup;
use crate::test_utils::test_config;
use crate::test_utils::EventLog;
use crate::monitor::MonitorPeer;
use crate::monitor::QuorumMonitor;
use crate::CoordinatorConfig;
use crate::Endpoint;
use crate::ErrorKind;
use crate::Result;
use crate::Role;
use crate::TopologyMode;

const SELF_RECORD: &str = "\
e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 10.0.0.10:6379@16379,node-0 myself,master - 0 1700000000123 1 connected 0-5460
67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 10.0.0.11:6379@16379,node-1 master - 0 1700000000456 2 connected 5461-10922
292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 10.0.0.12:6379@16379,node-2 master - 0 1700000000789 3 connected 10923-16383
vars currentEpoch 3 lastVoteEpoch 0
";

fn eight_gib() -> u64 {
    8 << 30
}

fn dependencies(
    log: &EventLog,
    role_info: &'static str,
    monitor: Option<MockQuorumMonitor>,
    exit_now: bool,
) -> Dependencies {
    let mut peer_roles = MockPeerRoleProbe::new();
    peer_roles.expect_reports_primary().returning(|_, _| Ok(false));
    Dependencies {
        lookup: Arc::new(indexed_lookup()),
        probe: Arc::new(healthy_probe()),
        peer_roles: Arc::new(peer_roles),
        monitor: monitor.map(|m| Arc::new(m) as Arc<dyn QuorumMonitor>),
        admin: Arc::new(compliant_engine(role_info, log)),
        cluster_ops: Arc::new(MockClusterOps::new()),
        launcher: Arc::new(fake_launcher(log, exit_now)),
    }
}

fn monitor_reporting(primary: Option<Endpoint>) -> MockQuorumMonitor {
    let mut monitor = MockQuorumMonitor::new();
    monitor
        .expect_primary_address()
        .returning(move |_| Ok(primary.clone()));
    monitor.expect_flush_config().returning(|| Ok(()));
    monitor.expect_reset().returning(|_| Ok(1));
    monitor.expect_replicas().returning(|_| {
        Ok(vec![MonitorPeer {
            name: "10.0.0.11:6379".into(),
            ip: "10.0.0.11".into(),
            port: 6379,
            flags: vec!["slave".into()],
        }])
    });
    monitor
}

/// Runs a controller whose shutdown signal is already pending, so it boots
/// and drains straight away.
async fn boot_and_drain(
    config: CoordinatorConfig,
    deps: Dependencies,
) -> (Result<()>, Arc<NodeStatus>) {
    let status = Arc::new(NodeStatus::new());
    let controller =
        LifecycleController::new(Arc::new(config), deps, status.clone()).with_total_memory(eight_gib);
    let (tx, rx) = watch::channel(());
    tx.send(()).unwrap();
    let result = controller.run(rx).await;
    (result, status)
}

#[tokio::test(start_paused = true)]
async fn standalone_node_boots_and_drains() {
    let dir = tempdir().unwrap();
    let log = event_log();
    let config = test_config(dir.path(), TopologyMode::Standalone, 0);
    let conf_path = config.node.engine_config_path();

    let (result, status) = boot_and_drain(config, dependencies(&log, "role:master\n", None, false)).await;

    result.unwrap();
    assert_eq!(status.phase(), LifecyclePhase::Stopped);
    assert_eq!(status.decision().unwrap().role, Role::Primary);

    let written = std::fs::read_to_string(conf_path).unwrap();
    assert!(!written.contains("replicaof"));
    assert!(written.contains("appendonly yes"));

    let seen = events(&log);
    assert_eq!(seen.first().map(String::as_str), Some("start engine"));
    assert!(seen.contains(&"config maxmemory 6553MB".to_string()));
    assert_eq!(&seen[seen.len() - 3..], ["checkpoint", "shutdown", "stop engine"]);
}

#[tokio::test(start_paused = true)]
async fn replica_follows_known_primary_across_restarts() {
    let dir = tempdir().unwrap();
    let conf_path = test_config(dir.path(), TopologyMode::Replicated, 1)
        .node
        .engine_config_path();

    for _ in 0..2 {
        let log = event_log();
        // Registration calls are not expected: a replica never registers.
        let monitor = monitor_reporting(Some(Endpoint::new("node-0", 6379)));
        let (result, status) = boot_and_drain(
            test_config(dir.path(), TopologyMode::Replicated, 1),
            dependencies(&log, "role:slave\n", Some(monitor), false),
        )
        .await;

        result.unwrap();
        let decision = status.decision().unwrap();
        assert_eq!(decision.role, Role::Replica);
        assert_eq!(decision.primary, Endpoint::new("node-0", 6379));
    }

    let written = std::fs::read_to_string(conf_path).unwrap();
    let upstream: Vec<_> = written.lines().filter(|l| l.starts_with("replicaof")).collect();
    assert_eq!(upstream, vec!["replicaof node-0 6379"]);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_node_self_elects_and_registers() {
    let dir = tempdir().unwrap();
    let log = event_log();
    let mut monitor = monitor_reporting(None);
    monitor.expect_monitor().times(1).returning(|_, _, _| Ok(()));
    monitor.expect_set().returning(|_, _, _| Ok(()));
    monitor.expect_failover().times(1).returning(|_| Ok(()));

    let (result, status) = boot_and_drain(
        test_config(dir.path(), TopologyMode::Replicated, 0),
        dependencies(&log, "role:master\n", Some(monitor), false),
    )
    .await;

    result.unwrap();
    assert_eq!(status.decision().unwrap().role, Role::Primary);
    assert!(events(&log).contains(&"shutdown".to_string()));
}

#[tokio::test(start_paused = true)]
async fn unexpected_engine_exit_is_fatal() {
    let dir = tempdir().unwrap();
    let log = event_log();
    let status = Arc::new(NodeStatus::new());
    let controller = LifecycleController::new(
        Arc::new(test_config(dir.path(), TopologyMode::Standalone, 0)),
        dependencies(&log, "role:master\n", None, true),
        status.clone(),
    )
    .with_total_memory(eight_gib);
    let (_tx, rx) = watch::channel(());

    let err = controller.run(rx).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Process);
    assert_eq!(status.phase(), LifecyclePhase::Ready);
    assert!(events(&log).contains(&"stop engine".to_string()));
}

/// Dependencies of a sharded node whose engine reports [`SELF_RECORD`] and
/// logs `cluster nodes` for each member table read.
fn sharded_dependencies(
    log: &EventLog,
    cluster_ops: MockClusterOps,
) -> Dependencies {
    let mut admin = compliant_engine("role:master\n", log);
    let nodes_log = log.clone();
    admin.expect_cluster_nodes().returning(move || {
        nodes_log.lock().unwrap().push("cluster nodes".to_string());
        Ok(SELF_RECORD.to_string())
    });
    admin.expect_cluster_meet().never();
    Dependencies {
        admin: Arc::new(admin),
        cluster_ops: Arc::new(cluster_ops),
        ..dependencies(log, "role:master\n", None, false)
    }
}

fn position(
    seen: &[String],
    event: &str,
) -> usize {
    seen.iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("{event} not in {seen:?}"))
}

#[tokio::test(start_paused = true)]
async fn sharded_creator_forms_then_reconciles_and_skips_formation_on_restart() {
    let dir = tempdir().unwrap();

    let log = event_log();
    let mut ops = MockClusterOps::new();
    ops.expect_known_members().returning(|_, _| Ok(1));
    ops.expect_topology_formed().returning(|_, _| Ok(false));
    let create_log = log.clone();
    ops.expect_create()
        .withf(|members, _| members.len() == 3)
        .times(1)
        .returning(move |_, _| {
            create_log.lock().unwrap().push("create".to_string());
            Ok(())
        });
    ops.expect_add_member().never();

    let (result, status) = boot_and_drain(
        test_config(dir.path(), TopologyMode::Sharded, 0),
        sharded_dependencies(&log, ops),
    )
    .await;

    result.unwrap();
    assert_eq!(status.phase(), LifecyclePhase::Stopped);
    assert_eq!(status.decision(), None);
    let seen = events(&log);
    assert!(position(&seen, "start engine") < position(&seen, "create"));
    assert!(position(&seen, "create") < position(&seen, "cluster nodes"));
    assert!(position(&seen, "cluster nodes") < position(&seen, "shutdown"));

    // The formation marker now short-circuits create and join.
    let log = event_log();
    let mut ops = MockClusterOps::new();
    ops.expect_known_members().never();
    ops.expect_topology_formed().never();
    ops.expect_create().never();
    ops.expect_add_member().never();

    let (result, status) = boot_and_drain(
        test_config(dir.path(), TopologyMode::Sharded, 0),
        sharded_dependencies(&log, ops),
    )
    .await;

    result.unwrap();
    assert_eq!(status.phase(), LifecyclePhase::Stopped);
    let seen = events(&log);
    assert!(!seen.contains(&"create".to_string()));
    assert!(position(&seen, "cluster nodes") < position(&seen, "shutdown"));
}
