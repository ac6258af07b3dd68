use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use mockall::predicate::eq;
use tempfile::tempdir;

use super::*;
use crate::engine::MockEngineAdmin;
use crate::peer::MockLivenessProbe;
use crate::peer::MockNameLookup;
use crate::ErrorKind;
use crate::NetworkError;
use crate::NodeIdentity;
use crate::PeerResolver;
use crate::RetryPolicy;

const PRIMARY_ID: &str = "e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca";

const RECORD: &str = "\
292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 10.0.0.13:6379@16379,node-3.node-hs myself,slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1700000000456 1 connected
e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 10.0.0.10:6379@16379,node-0.node-hs master - 0 1700000000123 1 connected 0-8191
67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 10.0.0.11:6379@16379,node-1.node-hs master,fail - 1700000000000 1700000000000 2 disconnected 8192-16383
vars currentEpoch 2 lastVoteEpoch 0
";

fn me(last_octet: u8) -> NodeIdentity {
    NodeIdentity {
        name: "node-3.node-hs".into(),
        address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)),
        port: 6379,
        bus_port: 16379,
    }
}

fn resolver(reachable: bool) -> PeerResolver {
    let mut lookup = MockNameLookup::new();
    lookup.expect_lookup().returning(move |host| {
        if reachable {
            Ok(vec![IpAddr::V4(Ipv4Addr::new(10, 0, 1, 11))])
        } else {
            Err(NetworkError::ResolveFailed {
                host: host.to_string(),
                reason: "NXDOMAIN".into(),
            }
            .into())
        }
    });
    let mut probe = MockLivenessProbe::new();
    probe.expect_ping().returning(|_, _| Ok(()));
    PeerResolver::new(Arc::new(lookup), Arc::new(probe), Duration::ZERO)
}

fn reconciler(
    path: &std::path::Path,
    reachable: bool,
) -> TopologyDriftReconciler {
    TopologyDriftReconciler::new(resolver(reachable), path, RetryPolicy::with_attempts(2000, 3))
}

#[tokio::test]
async fn moved_node_rewrites_only_its_own_address() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nodes.conf");
    std::fs::write(&path, RECORD).unwrap();

    let recorded = reconciler(&path, true).reconcile_record(&me(77)).await.unwrap().unwrap();

    assert!(recorded.rewritten);
    assert_eq!(recorded.upstream.as_deref(), Some(PRIMARY_ID));
    let expected = RECORD.replacen("10.0.0.13:6379", "10.0.0.77:6379", 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
}

#[tokio::test]
async fn unchanged_address_leaves_the_file_alone() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nodes.conf");
    std::fs::write(&path, RECORD).unwrap();

    let recorded = reconciler(&path, true).reconcile_record(&me(13)).await.unwrap().unwrap();

    assert!(!recorded.rewritten);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), RECORD);
}

#[tokio::test]
async fn missing_record_is_first_boot() {
    let dir = tempdir().unwrap();

    let recorded = reconciler(&dir.path().join("nodes.conf"), true)
        .reconcile_record(&me(13))
        .await
        .unwrap();

    assert_eq!(recorded, None);
}

#[tokio::test]
async fn corrupt_record_is_a_storage_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nodes.conf");
    std::fs::write(&path, "garbage\n").unwrap();

    let err = reconciler(&path, true).reconcile_record(&me(13)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn stale_peer_is_met_at_its_fresh_address() {
    let dir = tempdir().unwrap();
    let mut admin = MockEngineAdmin::new();
    admin.expect_cluster_nodes().returning(|| Ok(RECORD.to_string()));
    admin
        .expect_cluster_meet()
        .with(eq("10.0.1.11"), eq(6379u16), eq(16379u16))
        .times(1)
        .returning(|_, _, _| Ok(()));
    admin.expect_cluster_replicate().never();

    let report = reconciler(&dir.path().join("nodes.conf"), true)
        .reconcile_live(&admin, Some(PRIMARY_ID))
        .await
        .unwrap();

    assert_eq!(report.reintroduced, vec!["node-1.node-hs".to_string()]);
    assert!(report.failed.is_empty());
    assert!(report.skipped.is_empty());
    assert!(!report.upstream_repaired);
}

#[tokio::test]
async fn stale_peer_without_hostname_is_skipped_not_counted() {
    let dir = tempdir().unwrap();
    let live = RECORD.replace("10.0.0.11:6379@16379,node-1.node-hs", "10.0.0.11:6379@16379");
    let mut admin = MockEngineAdmin::new();
    admin.expect_cluster_nodes().returning(move || Ok(live.clone()));
    admin.expect_cluster_meet().never();

    let report = reconciler(&dir.path().join("nodes.conf"), true)
        .reconcile_live(&admin, None)
        .await
        .unwrap();

    assert!(report.reintroduced.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.skipped, vec!["67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unresolvable_stale_peer_is_not_fatal() {
    let dir = tempdir().unwrap();
    let mut admin = MockEngineAdmin::new();
    admin.expect_cluster_nodes().returning(|| Ok(RECORD.to_string()));
    admin.expect_cluster_meet().never();

    let report = reconciler(&dir.path().join("nodes.conf"), false)
        .reconcile_live(&admin, None)
        .await
        .unwrap();

    assert_eq!(report.failed, vec!["node-1.node-hs".to_string()]);
}

#[tokio::test]
async fn lost_upstream_is_repointed_by_identifier() {
    let dir = tempdir().unwrap();
    // After restart the engine lost track of its primary.
    let live = RECORD
        .replace(
            "myself,slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca",
            "myself,master -",
        )
        .replace("master,fail -", "master -")
        .replace("2 disconnected", "2 connected");
    let mut admin = MockEngineAdmin::new();
    admin.expect_cluster_nodes().returning(move || Ok(live.clone()));
    admin
        .expect_cluster_replicate()
        .with(eq(PRIMARY_ID))
        .times(1)
        .returning(|_| Ok(()));

    let report = reconciler(&dir.path().join("nodes.conf"), true)
        .reconcile_live(&admin, Some(PRIMARY_ID))
        .await
        .unwrap();

    assert!(report.upstream_repaired);
    assert!(report.reintroduced.is_empty());
}
