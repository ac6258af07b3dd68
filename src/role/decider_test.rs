use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::monitor::MockQuorumMonitor;
use crate::monitor::QuorumMonitor;
use crate::peer::MockLivenessProbe;
use crate::peer::MockNameLookup;
use crate::Endpoint;
use crate::NetworkError;
use crate::NodeIdentity;
use crate::PeerResolver;
use crate::PeerSet;
use crate::PeersConfig;
use crate::RetryPolicy;

const NODE_0: &str = "node-0.node-hs.default.svc.cluster.local";
const NODE_1: &str = "node-1.node-hs.default.svc.cluster.local";

fn identity(index: u32) -> NodeIdentity {
    NodeIdentity {
        name: format!("node-{index}.node-hs.default.svc.cluster.local"),
        address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 10 + index as u8)),
        port: 6379,
        bus_port: 16379,
    }
}

fn resolver() -> PeerResolver {
    let mut lookup = MockNameLookup::new();
    lookup.expect_lookup().returning(|host| {
        match host {
            NODE_0 => Ok(vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 10))]),
            NODE_1 => Ok(vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 11))]),
            other => Err(NetworkError::ResolveFailed {
                host: other.to_string(),
                reason: "NXDOMAIN".into(),
            }
            .into()),
        }
    });
    let mut probe = MockLivenessProbe::new();
    probe.expect_ping().returning(|_, _| Ok(()));
    PeerResolver::new(Arc::new(lookup), Arc::new(probe), Duration::ZERO)
}

fn peers() -> PeerSet {
    PeerSet::from_config(
        &PeersConfig {
            hostname_template: "node-{index}.node-hs.default.svc.cluster.local".into(),
            host_count: 3,
            ..PeersConfig::default()
        },
        6379,
    )
}

fn policies() -> DiscoveryPolicies {
    DiscoveryPolicies {
        primary_discovery: RetryPolicy::unbounded(5000),
        bootstrap_discovery: RetryPolicy::with_attempts(5000, 3),
    }
}

fn silent_peers() -> MockPeerRoleProbe {
    let mut probe = MockPeerRoleProbe::new();
    probe.expect_reports_primary().returning(|_, _| Ok(false));
    probe
}

fn decider(
    monitor: Option<MockQuorumMonitor>,
    peer_roles: MockPeerRoleProbe,
) -> RoleDecider {
    RoleDecider::new(
        resolver(),
        monitor.map(|m| Arc::new(m) as Arc<dyn QuorumMonitor>),
        Arc::new(peer_roles),
        "master",
        peers(),
        0,
        policies(),
    )
}

fn unreachable() -> crate::Error {
    NetworkError::ResolveFailed {
        host: "sentinel".into(),
        reason: "connection refused".into(),
    }
    .into()
}

#[tokio::test(start_paused = true)]
async fn standalone_bootstrap_is_primary_immediately() {
    let decider = decider(None, silent_peers());

    let decision = decider.decide(&identity(0), 0).await.unwrap();

    assert_eq!(decision.role, Role::Primary);
    assert_eq!(decision.upstream(), None);
}

#[tokio::test(start_paused = true)]
async fn without_monitor_other_indexes_follow_the_bootstrap_peer() {
    let decider = decider(None, silent_peers());

    let decision = decider.decide(&identity(2), 2).await.unwrap();

    assert_eq!(decision, RoleDecision::replica_of(Endpoint::new(NODE_0, 6379)));
}

#[tokio::test(start_paused = true)]
async fn replica_follows_the_monitor_reported_primary() {
    let mut monitor = MockQuorumMonitor::new();
    monitor
        .expect_primary_address()
        .returning(|_| Ok(Some(Endpoint::new("node-0", 6379))));
    let decider = decider(Some(monitor), silent_peers());

    let decision = decider.decide(&identity(1), 1).await.unwrap();

    assert_eq!(decision.role, Role::Replica);
    assert_eq!(decision.upstream(), Some(&Endpoint::new("node-0", 6379)));
}

#[tokio::test(start_paused = true)]
async fn ip_form_of_own_address_classifies_as_primary() {
    let mut monitor = MockQuorumMonitor::new();
    monitor
        .expect_primary_address()
        .returning(|_| Ok(Some(Endpoint::new("10.0.0.11", 6379))));
    let decider = decider(Some(monitor), silent_peers());

    let decision = decider.decide(&identity(1), 1).await.unwrap();

    assert_eq!(decision.role, Role::Primary);
}

#[tokio::test(start_paused = true)]
async fn hostname_form_of_own_address_classifies_as_primary() {
    let mut monitor = MockQuorumMonitor::new();
    monitor
        .expect_primary_address()
        .returning(|_| Ok(Some(Endpoint::new("NODE-0.node-hs.default.svc.cluster.local.", 6379))));
    let decider = decider(Some(monitor), silent_peers());

    let decision = decider.decide(&identity(0), 0).await.unwrap();

    assert_eq!(decision.role, Role::Primary);
}

#[tokio::test(start_paused = true)]
async fn non_bootstrap_never_self_elects_while_monitor_is_down() {
    let mut monitor = MockQuorumMonitor::new();
    monitor.expect_primary_address().returning(|_| Err(unreachable()));
    let mut peer_roles = MockPeerRoleProbe::new();
    peer_roles.expect_reports_primary().never();
    let decider = decider(Some(monitor), peer_roles);

    let outcome = tokio::time::timeout(Duration::from_secs(3600), decider.decide(&identity(2), 2)).await;

    assert!(outcome.is_err(), "decider must still be waiting, got {outcome:?}");
}

#[tokio::test(start_paused = true)]
async fn non_bootstrap_waits_until_a_primary_appears() {
    let mut monitor = MockQuorumMonitor::new();
    let mut seq = mockall::Sequence::new();
    monitor
        .expect_primary_address()
        .times(4)
        .in_sequence(&mut seq)
        .returning(|_| Ok(None));
    monitor
        .expect_primary_address()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Some(Endpoint::new(NODE_0, 6379))));
    let decider = decider(Some(monitor), silent_peers());

    let decision = decider.decide(&identity(1), 1).await.unwrap();

    assert_eq!(decision.upstream(), Some(&Endpoint::new(NODE_0, 6379)));
}

#[tokio::test(start_paused = true)]
async fn bootstrap_self_elects_when_monitor_knows_no_primary_and_peers_are_silent() {
    let mut monitor = MockQuorumMonitor::new();
    monitor.expect_primary_address().times(3).returning(|_| Ok(None));
    let decider = decider(Some(monitor), silent_peers());

    let decision = decider.decide(&identity(0), 0).await.unwrap();

    assert_eq!(decision, RoleDecision::primary(Endpoint::new(NODE_0, 6379)));
}

#[tokio::test(start_paused = true)]
async fn bootstrap_joins_a_peer_that_already_leads() {
    let mut monitor = MockQuorumMonitor::new();
    monitor.expect_primary_address().returning(|_| Ok(None));
    let mut peer_roles = MockPeerRoleProbe::new();
    peer_roles
        .expect_reports_primary()
        .returning(|host, _| Ok(host.starts_with("node-2")));
    let decider = decider(Some(monitor), peer_roles);

    let decision = decider.decide(&identity(0), 0).await.unwrap();

    assert_eq!(decision.role, Role::Replica);
    assert!(decision.primary.host.starts_with("node-2"));
}

#[tokio::test(start_paused = true)]
async fn bootstrap_self_elects_when_monitor_never_answers() {
    let mut monitor = MockQuorumMonitor::new();
    monitor.expect_primary_address().times(3).returning(|_| Err(unreachable()));
    let decider = decider(Some(monitor), silent_peers());

    let decision = decider.decide(&identity(0), 0).await.unwrap();

    assert_eq!(decision, RoleDecision::primary(Endpoint::new(NODE_0, 6379)));
}

#[tokio::test(start_paused = true)]
async fn unreachable_monitor_still_defers_to_a_leading_peer() {
    let mut monitor = MockQuorumMonitor::new();
    monitor.expect_primary_address().returning(|_| Err(unreachable()));
    let mut peer_roles = MockPeerRoleProbe::new();
    peer_roles
        .expect_reports_primary()
        .returning(|host, _| Ok(host.starts_with("node-1")));
    let decider = decider(Some(monitor), peer_roles);

    let decision = decider.decide(&identity(0), 0).await.unwrap();

    assert_eq!(decision.upstream(), Some(&Endpoint::new(NODE_1, 6379)));
}
