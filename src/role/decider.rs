use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::engine::Connector;
use crate::engine::InfoReport;
use crate::monitor::QuorumMonitor;
use crate::utils::async_task::retry_until;
use crate::CoordinationError;
use crate::Endpoint;
use crate::NodeIdentity;
use crate::PeerResolver;
use crate::PeerSet;
use crate::Result;
use crate::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Unknown,
    Primary,
    Replica,
}

impl fmt::Display for Role {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Role::Unknown => write!(f, "unknown"),
            Role::Primary => write!(f, "primary"),
            Role::Replica => write!(f, "replica"),
        }
    }
}

/// Outcome of role decision: the role and the primary it implies. For a
/// primary, `primary` is the node itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDecision {
    pub role: Role,
    pub primary: Endpoint,
}

impl RoleDecision {
    pub fn primary(me: Endpoint) -> Self {
        Self {
            role: Role::Primary,
            primary: me,
        }
    }

    pub fn replica_of(upstream: Endpoint) -> Self {
        Self {
            role: Role::Replica,
            primary: upstream,
        }
    }

    /// Upstream to replicate from, `None` for a primary.
    pub fn upstream(&self) -> Option<&Endpoint> {
        (self.role == Role::Replica).then_some(&self.primary)
    }
}

/// Asks a peer engine whether it currently acts as primary.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PeerRoleProbe: Send + Sync {
    async fn reports_primary(
        &self,
        host: &str,
        port: u16,
    ) -> Result<bool>;
}

#[async_trait]
impl PeerRoleProbe for Connector {
    async fn reports_primary(
        &self,
        host: &str,
        port: u16,
    ) -> Result<bool> {
        let text: String = self
            .query(host, port, "INFO", redis::cmd("INFO").arg("replication"))
            .await?;
        Ok(InfoReport::parse(&text).is_primary())
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryPolicies {
    /// Non-bootstrap nodes waiting for a primary
    pub primary_discovery: RetryPolicy,
    /// Bootstrap node asking before it self-elects
    pub bootstrap_discovery: RetryPolicy,
}

/// Decides primary or replica at boot.
pub struct RoleDecider {
    resolver: PeerResolver,
    monitor: Option<Arc<dyn QuorumMonitor>>,
    peer_roles: Arc<dyn PeerRoleProbe>,
    group: String,
    peers: PeerSet,
    bootstrap_index: u32,
    policies: DiscoveryPolicies,
}

/// What one discovery round learned from the monitor.
enum MonitorView {
    Primary(Endpoint),
    NoPrimary,
    Unreachable,
}

impl RoleDecider {
    pub fn new(
        resolver: PeerResolver,
        monitor: Option<Arc<dyn QuorumMonitor>>,
        peer_roles: Arc<dyn PeerRoleProbe>,
        group: impl Into<String>,
        peers: PeerSet,
        bootstrap_index: u32,
        policies: DiscoveryPolicies,
    ) -> Self {
        Self {
            resolver,
            monitor,
            peer_roles,
            group: group.into(),
            peers,
            bootstrap_index,
            policies,
        }
    }

    /// Only the bootstrap index may ever self-elect. Other indexes wait for
    /// the monitor for as long as `primary_discovery` allows.
    #[instrument(skip(self, me), fields(node = %me.name))]
    pub async fn decide(
        &self,
        me: &NodeIdentity,
        index: u32,
    ) -> Result<RoleDecision> {
        let Some(monitor) = self.monitor.as_deref() else {
            return self.decide_without_monitor(me, index);
        };

        if index != self.bootstrap_index {
            let primary = retry_until("primary discovery", &self.policies.primary_discovery, |_| async move {
                match monitor.primary_address(&self.group).await? {
                    Some(primary) => Ok(primary),
                    None => Err(CoordinationError::RoleUndetermined(format!(
                        "monitor knows no primary for {}",
                        self.group
                    ))
                    .into()),
                }
            })
            .await?;
            return Ok(self.classify(me, primary).await);
        }

        let discovered = retry_until("bootstrap discovery", &self.policies.bootstrap_discovery, |_| async move {
            match self.ask_monitor(monitor).await {
                MonitorView::Primary(primary) => Ok(primary),
                MonitorView::NoPrimary => {
                    Err(CoordinationError::RoleUndetermined("no primary registered".into()).into())
                }
                MonitorView::Unreachable => {
                    Err(CoordinationError::RoleUndetermined("monitor unreachable".into()).into())
                }
            }
        })
        .await;

        match discovered {
            Ok(primary) => Ok(self.classify(me, primary).await),
            Err(exhausted) => {
                if let Some(primary) = self.find_reporting_peer(index).await {
                    info!("peer {primary} already acts as primary");
                    return Ok(RoleDecision::replica_of(primary));
                }
                // Unreachable counts the same as "no primary registered".
                info!(
                    "no primary known after {} attempts ({}), bootstrap node self-elects",
                    exhausted.attempts, exhausted.last_error
                );
                Ok(RoleDecision::primary(me.endpoint()))
            }
        }
    }

    fn decide_without_monitor(
        &self,
        me: &NodeIdentity,
        index: u32,
    ) -> Result<RoleDecision> {
        if index == self.bootstrap_index {
            return Ok(RoleDecision::primary(me.endpoint()));
        }
        let upstream = self.peers.get(self.bootstrap_index).cloned().ok_or_else(|| {
            CoordinationError::RoleUndetermined(format!(
                "bootstrap index {} outside the peer set",
                self.bootstrap_index
            ))
        })?;
        Ok(RoleDecision::replica_of(upstream))
    }

    async fn ask_monitor(
        &self,
        monitor: &dyn QuorumMonitor,
    ) -> MonitorView {
        match monitor.primary_address(&self.group).await {
            Ok(Some(primary)) => MonitorView::Primary(primary),
            Ok(None) => MonitorView::NoPrimary,
            Err(e) => {
                warn!("monitor query failed: {e}");
                MonitorView::Unreachable
            }
        }
    }

    async fn find_reporting_peer(
        &self,
        index: u32,
    ) -> Option<Endpoint> {
        for (_, peer) in self.peers.others(index) {
            match self.peer_roles.reports_primary(&peer.host, peer.port).await {
                Ok(true) => return Some(peer.clone()),
                Ok(false) => {}
                Err(e) => info!("peer {peer} did not report a role: {e}"),
            }
        }
        None
    }

    /// Primary when the reported address is this node under any equivalent
    /// form, replica of it otherwise.
    async fn classify(
        &self,
        me: &NodeIdentity,
        primary: Endpoint,
    ) -> RoleDecision {
        let own_ip = Endpoint::new(me.address.to_string(), me.port);
        let is_self = primary.literal_ip() == Some(me.address) && primary.port == me.port
            || self.resolver.same_node(&me.endpoint(), &primary).await
            || self.resolver.same_node(&own_ip, &primary).await;

        if is_self {
            info!("monitor reports this node ({primary}) as primary");
            RoleDecision::primary(me.endpoint())
        } else {
            info!("replicating from {primary}");
            RoleDecision::replica_of(primary)
        }
    }
}
