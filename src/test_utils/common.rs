use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::peer::MockLivenessProbe;
use crate::peer::MockNameLookup;
use crate::CoordinatorConfig;
use crate::NetworkError;
use crate::PeerResolver;
use crate::RetryPolicy;
use crate::TopologyMode;

/// `node-N` lives at 10.0.0.(10+N).
pub fn peer_ip(index: u32) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, 10 + index as u8))
}

/// Resolves any `node-N[.suffix]` name to [`peer_ip`]; everything else fails.
pub fn indexed_lookup() -> MockNameLookup {
    let mut lookup = MockNameLookup::new();
    lookup.expect_lookup().returning(|host| {
        host.strip_prefix("node-")
            .and_then(|rest| rest.split('.').next())
            .and_then(|n| n.parse::<u32>().ok())
            .map(|index| vec![peer_ip(index)])
            .ok_or_else(|| {
                NetworkError::ResolveFailed {
                    host: host.to_string(),
                    reason: "NXDOMAIN".into(),
                }
                .into()
            })
    });
    lookup
}

pub fn healthy_probe() -> MockLivenessProbe {
    let mut probe = MockLivenessProbe::new();
    probe.expect_ping().returning(|_, _| Ok(()));
    probe
}

pub fn indexed_resolver() -> PeerResolver {
    PeerResolver::new(Arc::new(indexed_lookup()), Arc::new(healthy_probe()), Duration::ZERO)
}

/// Node `index` of a three-host deployment with every file under `data_dir`
/// and no artificial delays.
pub fn test_config(
    data_dir: &Path,
    topology: TopologyMode,
    index: u32,
) -> CoordinatorConfig {
    let mut config = CoordinatorConfig::default();
    config.node.name = format!("node-{index}");
    config.node.index = Some(index);
    config.node.topology = topology;
    config.node.data_dir = data_dir.to_path_buf();
    config.node.engine_warmup_ms = 0;
    config.node.engine_stop_timeout_ms = 1000;
    config.peers.hostname_template = "node-{index}".into();
    config.peers.host_count = 3;
    config.peers.settle_delay_ms = 0;
    config.credentials.admin_password = "admin-secret".into();
    config.credentials.maintenance_password = "upgrade-secret".into();
    config.health.enabled = false;
    config.retry.peer_resolution = RetryPolicy::with_deadline(1000, 10_000);
    config.retry.engine_ready = RetryPolicy::with_deadline(100, 5_000);
    config.retry.checkpoint_wait = RetryPolicy::with_deadline(100, 2_000);
    config.retry.failover_wait = RetryPolicy::with_attempts(100, 5);
    config
}
