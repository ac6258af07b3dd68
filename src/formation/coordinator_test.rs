use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use mockall::predicate::eq;
use tempfile::tempdir;
use tempfile::TempDir;

use super::*;
use crate::peer::MockLivenessProbe;
use crate::peer::MockNameLookup;
use crate::topology::FormationMarker;
use crate::ClusterConfig;
use crate::Endpoint;
use crate::EngineError;
use crate::ErrorKind;
use crate::NetworkError;
use crate::NodeIdentity;
use crate::PeerResolver;
use crate::PeerSet;
use crate::PeersConfig;
use crate::RetryPolicy;

const HOSTS: u32 = 6;

fn ip(index: u32) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, 10 + index as u8))
}

fn peer(index: u32) -> Endpoint {
    Endpoint::new(format!("node-{index}.node-hs"), 6379)
}

/// `node-N.node-hs` resolves to 10.0.0.(10+N) except for `unreachable`.
fn resolver(unreachable: Option<u32>) -> PeerResolver {
    let mut lookup = MockNameLookup::new();
    lookup.expect_lookup().returning(move |host| {
        let index = host
            .strip_prefix("node-")
            .and_then(|rest| rest.split('.').next())
            .and_then(|n| n.parse::<u32>().ok());
        match index {
            Some(i) if Some(i) != unreachable => Ok(vec![ip(i)]),
            _ => Err(NetworkError::ResolveFailed {
                host: host.to_string(),
                reason: "NXDOMAIN".into(),
            }
            .into()),
        }
    });
    let mut probe = MockLivenessProbe::new();
    probe.expect_ping().returning(|_, _| Ok(()));
    PeerResolver::new(Arc::new(lookup), Arc::new(probe), Duration::ZERO)
}

fn policies() -> FormationPolicies {
    FormationPolicies {
        peer_resolution: RetryPolicy::with_deadline(5000, 30_000),
        creator_wait: RetryPolicy::unbounded(5000),
        cluster_join: RetryPolicy::with_attempts(10_000, 5),
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self { dir: tempdir().unwrap() }
    }

    fn marker(&self) -> FormationMarker {
        FormationMarker::new(self.dir.path().join("cluster_initialized"))
    }

    fn coordinator(
        &self,
        ops: MockClusterOps,
        index: u32,
        unreachable: Option<u32>,
    ) -> ClusterFormationCoordinator {
        let peers = PeerSet::from_config(
            &PeersConfig {
                hostname_template: "node-{index}.node-hs".into(),
                host_count: HOSTS,
                ..PeersConfig::default()
            },
            6379,
        );
        let me = NodeIdentity {
            name: format!("node-{index}.node-hs"),
            address: ip(index),
            port: 6379,
            bus_port: 16379,
        };
        ClusterFormationCoordinator::new(
            Arc::new(ops),
            resolver(unreachable),
            self.marker(),
            peers,
            me,
            index,
            ClusterConfig::default(),
            policies(),
        )
    }
}

fn fresh_engine(ops: &mut MockClusterOps) {
    ops.expect_known_members().returning(|_, _| Ok(1));
}

#[tokio::test(start_paused = true)]
async fn creator_creates_once_from_all_six_hosts() {
    let fixture = Fixture::new();
    let mut ops = MockClusterOps::new();
    fresh_engine(&mut ops);
    ops.expect_topology_formed().times(5).returning(|_, _| Ok(false));
    ops.expect_create()
        .withf(|members, replicas| {
            *replicas == 1
                && members.len() == HOSTS as usize
                && (0..HOSTS).all(|i| members[i as usize] == Endpoint::new(ip(i).to_string(), 6379))
        })
        .times(1)
        .returning(|_, _| Ok(()));
    ops.expect_add_member().never();

    let outcome = fixture.coordinator(ops, 0, None).run().await.unwrap();

    assert_eq!(outcome, FormationOutcome::Created);
    assert!(fixture.marker().is_set().await);
}

#[tokio::test(start_paused = true)]
async fn marker_prevents_a_second_create() {
    let fixture = Fixture::new();
    fixture.marker().set("created").await.unwrap();
    let mut ops = MockClusterOps::new();
    ops.expect_known_members().never();
    ops.expect_topology_formed().never();
    ops.expect_create().never();
    ops.expect_add_member().never();

    let outcome = fixture.coordinator(ops, 0, None).run().await.unwrap();

    assert_eq!(outcome, FormationOutcome::AlreadyMember);
}

#[tokio::test(start_paused = true)]
async fn engine_that_knows_members_is_formed_and_marked() {
    let fixture = Fixture::new();
    let mut ops = MockClusterOps::new();
    ops.expect_known_members()
        .with(eq("node-4.node-hs"), eq(6379u16))
        .returning(|_, _| Ok(6));
    ops.expect_topology_formed().never();
    ops.expect_add_member().never();

    let outcome = fixture.coordinator(ops, 4, None).run().await.unwrap();

    assert_eq!(outcome, FormationOutcome::AlreadyMember);
    assert!(fixture.marker().is_set().await);
}

#[tokio::test(start_paused = true)]
async fn joiner_retries_one_transient_failure_then_joins_as_replica() {
    let fixture = Fixture::new();
    let mut ops = MockClusterOps::new();
    fresh_engine(&mut ops);
    ops.expect_topology_formed()
        .with(eq("node-0.node-hs"), eq(6379u16))
        .returning(|_, _| Ok(true));
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    ops.expect_add_member()
        .with(
            eq(Endpoint::new("10.0.0.13", 6379)),
            eq(Endpoint::new("10.0.0.10", 6379)),
            eq(true),
        )
        .times(2)
        .returning(move |_, _, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(EngineError::ToolFailed {
                    action: "add-node",
                    status: "exit status: 1".into(),
                    stderr: "Connection refused".into(),
                }
                .into())
            } else {
                Ok(())
            }
        });
    ops.expect_create().never();

    let outcome = fixture.coordinator(ops, 3, None).run().await.unwrap();

    assert_eq!(outcome, FormationOutcome::Joined { via: peer(0) });
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(fixture.marker().is_set().await);
}

#[tokio::test(start_paused = true)]
async fn join_that_landed_despite_an_error_is_not_repeated() {
    let fixture = Fixture::new();
    let mut ops = MockClusterOps::new();
    let lookups = Arc::new(AtomicU32::new(0));
    let counter = lookups.clone();
    // Fresh on boot, a member of the topology once the first add-node ran.
    ops.expect_known_members()
        .with(eq("node-3.node-hs"), eq(6379u16))
        .returning(move |_, _| Ok(if counter.fetch_add(1, Ordering::SeqCst) == 0 { 1 } else { 6 }));
    ops.expect_topology_formed().returning(|_, _| Ok(true));
    ops.expect_add_member().times(1).returning(|_, _, _| {
        Err(EngineError::ToolFailed {
            action: "add-node",
            status: "exit status: 1".into(),
            stderr: "timed out waiting for the cluster to join".into(),
        }
        .into())
    });
    ops.expect_create().never();

    let outcome = fixture.coordinator(ops, 3, None).run().await.unwrap();

    assert_eq!(outcome, FormationOutcome::Joined { via: peer(0) });
    assert_eq!(lookups.load(Ordering::SeqCst), 2);
    assert!(fixture.marker().is_set().await);
}

#[tokio::test(start_paused = true)]
async fn group_head_joins_as_primary() {
    let fixture = Fixture::new();
    let mut ops = MockClusterOps::new();
    fresh_engine(&mut ops);
    ops.expect_topology_formed().returning(|_, _| Ok(true));
    ops.expect_add_member()
        .withf(|_, _, as_replica| !*as_replica)
        .times(1)
        .returning(|_, _, _| Ok(()));

    let outcome = fixture.coordinator(ops, 2, None).run().await.unwrap();

    assert!(matches!(outcome, FormationOutcome::Joined { .. }));
}

#[tokio::test(start_paused = true)]
async fn non_creator_waits_for_the_creator_and_never_creates() {
    let fixture = Fixture::new();
    let mut ops = MockClusterOps::new();
    fresh_engine(&mut ops);
    let probes = Arc::new(AtomicU32::new(0));
    let counter = probes.clone();
    // Two witnesses per pass: the first two passes find nothing.
    ops.expect_topology_formed().returning(move |host, _| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(n >= 4 && host == "node-0.node-hs")
    });
    ops.expect_add_member().times(1).returning(|_, _, _| Ok(()));
    ops.expect_create().never();

    let outcome = fixture.coordinator(ops, 5, None).run().await.unwrap();

    assert_eq!(outcome, FormationOutcome::Joined { via: peer(0) });
}

#[tokio::test(start_paused = true)]
async fn failed_create_is_fatal_and_not_retried() {
    let fixture = Fixture::new();
    let mut ops = MockClusterOps::new();
    fresh_engine(&mut ops);
    ops.expect_topology_formed().returning(|_, _| Ok(false));
    ops.expect_create().times(1).returning(|_, _| {
        Err(EngineError::ToolFailed {
            action: "create",
            status: "exit status: 1".into(),
            stderr: "[ERR] Node 10.0.0.12:6379 is not empty".into(),
        }
        .into())
    });

    let err = fixture.coordinator(ops, 0, None).run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Formation);
    assert!(!fixture.marker().is_set().await);
}

#[tokio::test(start_paused = true)]
async fn create_requires_every_peer_to_be_live() {
    let fixture = Fixture::new();
    let mut ops = MockClusterOps::new();
    fresh_engine(&mut ops);
    ops.expect_topology_formed().returning(|_, _| Ok(false));
    ops.expect_create().never();

    let err = fixture.coordinator(ops, 0, Some(4)).run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Formation);
    assert!(err.to_string().contains("node-4.node-hs:6379"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_join_is_fatal() {
    let fixture = Fixture::new();
    let mut ops = MockClusterOps::new();
    fresh_engine(&mut ops);
    ops.expect_topology_formed().returning(|_, _| Ok(true));
    ops.expect_add_member().times(5).returning(|_, _, _| {
        Err(EngineError::ToolFailed {
            action: "add-node",
            status: "exit status: 1".into(),
            stderr: "timeout".into(),
        }
        .into())
    });

    let err = fixture.coordinator(ops, 1, None).run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Formation);
    assert!(!fixture.marker().is_set().await);
}
