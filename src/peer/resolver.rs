use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::debug;
use tracing::info;
use tracing::instrument;

use super::Endpoint;
use super::ResolvedEndpoint;
use crate::constants::PONG;
use crate::engine::Connector;
use crate::utils::async_task::retry_until;
use crate::utils::net::canonical_ip;
use crate::NetworkError;
use crate::Result;
use crate::RetryPolicy;

/// Name service seam.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NameLookup: Send + Sync {
    async fn lookup(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr>>;
}

/// Application-level liveness check: an authenticated `PING` answered by `PONG`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn ping(
        &self,
        host: &str,
        port: u16,
    ) -> Result<()>;
}

/// System resolver through `tokio::net::lookup_host`.
#[derive(Debug, Clone)]
pub struct DnsLookup {
    timeout: Duration,
}

impl DnsLookup {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl NameLookup for DnsLookup {
    async fn lookup(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr>> {
        let failed = |reason: String| NetworkError::ResolveFailed {
            host: host.to_string(),
            reason,
        };
        let addrs = match timeout(self.timeout, tokio::net::lookup_host((host, 0))).await {
            Ok(Ok(addrs)) => addrs,
            Ok(Err(e)) => return Err(failed(e.to_string()).into()),
            Err(_) => return Err(failed(format!("no answer within {:?}", self.timeout)).into()),
        };

        let mut seen = HashSet::new();
        let ips: Vec<IpAddr> = addrs
            .map(|a| canonical_ip(a.ip()))
            .filter(|ip| seen.insert(*ip))
            .collect();
        if ips.is_empty() {
            return Err(failed("no addresses".to_string()).into());
        }
        Ok(ips)
    }
}

#[async_trait]
impl LivenessProbe for Connector {
    async fn ping(
        &self,
        host: &str,
        port: u16,
    ) -> Result<()> {
        let reply: String = self.query(host, port, "PING", &redis::cmd("PING")).await?;
        if reply == PONG {
            Ok(())
        } else {
            Err(NetworkError::UnexpectedProbeReply {
                endpoint: format!("{host}:{port}"),
                reply,
            }
            .into())
        }
    }
}

/// Turns logical peer names into live endpoints.
#[derive(Clone)]
pub struct PeerResolver {
    lookup: Arc<dyn NameLookup>,
    probe: Arc<dyn LivenessProbe>,
    settle_delay: Duration,
}

impl PeerResolver {
    pub fn new(
        lookup: Arc<dyn NameLookup>,
        probe: Arc<dyn LivenessProbe>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            lookup,
            probe,
            settle_delay,
        }
    }

    /// Resolves `name` and waits until it answers the liveness probe.
    ///
    /// Literal addresses return immediately without probing. Once a
    /// freshly resolvable peer answers, the resolver pauses for the settle
    /// delay before returning. Running out of `policy` is fatal to the caller.
    #[instrument(skip(self, policy))]
    pub async fn resolve(
        &self,
        name: &str,
        port: u16,
        policy: &RetryPolicy,
    ) -> Result<ResolvedEndpoint> {
        let endpoint = Endpoint::new(name, port);
        if let Some(ip) = endpoint.literal_ip() {
            return Ok(ResolvedEndpoint {
                endpoint,
                addrs: vec![ip],
            });
        }

        let operation = format!("resolve {endpoint}");
        let resolved = retry_until(&operation, policy, |_| self.probe_once(&endpoint))
            .await
            .map_err(|e| NetworkError::PeerUnreachable {
                peer: endpoint.to_string(),
                elapsed: e.elapsed,
            })?;

        info!("peer {} is live at {:?}", endpoint, resolved.addrs);
        if !self.settle_delay.is_zero() {
            sleep(self.settle_delay).await;
        }
        Ok(resolved)
    }

    /// Single lookup plus liveness probe, no retries and no settle delay.
    pub async fn probe_once(
        &self,
        endpoint: &Endpoint,
    ) -> Result<ResolvedEndpoint> {
        let addrs = self.addresses(&endpoint.host).await?;
        self.probe.ping(&endpoint.host, endpoint.port).await?;
        Ok(ResolvedEndpoint {
            endpoint: endpoint.clone(),
            addrs,
        })
    }

    /// Addresses of `host`; literals map to themselves.
    pub async fn addresses(
        &self,
        host: &str,
    ) -> Result<Vec<IpAddr>> {
        match crate::utils::net::parse_ip_literal(host) {
            Some(ip) => Ok(vec![ip]),
            None => self.lookup.lookup(host).await,
        }
    }

    /// Whether two endpoints denote the same node: same port, and either the
    /// same normalized name or overlapping resolved addresses. Lookup failures
    /// leave only the name comparison.
    pub async fn same_node(
        &self,
        a: &Endpoint,
        b: &Endpoint,
    ) -> bool {
        if a.port != b.port {
            return false;
        }
        if a.same_name(b) {
            return true;
        }
        let (left, right) = match (self.addresses(&a.host).await, self.addresses(&b.host).await) {
            (Ok(left), Ok(right)) => (left, right),
            (l, r) => {
                debug!("address comparison of {a} and {b} fell back to names: {:?} {:?}", l.err(), r.err());
                return false;
            }
        };
        left.iter().any(|ip| right.contains(ip))
    }
}
