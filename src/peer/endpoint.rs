use std::fmt;
use std::net::IpAddr;

use crate::utils::net::normalize_hostname;
use crate::utils::net::parse_ip_literal;
use crate::utils::net::split_host_port;
use crate::PeersConfig;
use crate::Result;

/// A `host:port` pair where `host` may be a name or a literal address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Accepts `host:port`, `[v6]:port` and `host port`.
    pub fn parse(addr: &str) -> Result<Self> {
        let (host, port) = split_host_port(addr)?;
        Ok(Self { host, port })
    }

    pub fn literal_ip(&self) -> Option<IpAddr> {
        parse_ip_literal(&self.host)
    }

    /// Same port and same hostname after case and root-dot normalization.
    pub fn same_name(
        &self,
        other: &Endpoint,
    ) -> bool {
        self.port == other.port && normalize_hostname(&self.host) == normalize_hostname(&other.host)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// An endpoint together with the addresses its name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub endpoint: Endpoint,
    pub addrs: Vec<IpAddr>,
}

impl ResolvedEndpoint {
    /// First resolved address; the name itself for literals.
    pub fn primary_addr(&self) -> Option<IpAddr> {
        self.addrs.first().copied()
    }
}

/// This node as peers see it; re-resolved on every boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub name: String,
    pub address: IpAddr,
    pub port: u16,
    pub bus_port: u16,
}

impl NodeIdentity {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.name.clone(), self.port)
    }
}

/// Ordered peer endpoints `0..host_count` derived from the hostname template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSet {
    members: Vec<Endpoint>,
}

impl PeerSet {
    pub fn from_config(
        peers: &PeersConfig,
        port: u16,
    ) -> Self {
        let members = (0..peers.host_count)
            .map(|index| Endpoint::new(hostname_for(&peers.hostname_template, index), port))
            .collect();
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(
        &self,
        index: u32,
    ) -> Option<&Endpoint> {
        self.members.get(index as usize)
    }

    pub fn members(&self) -> &[Endpoint] {
        &self.members
    }

    /// Every member except `index`, in index order.
    pub fn others(
        &self,
        index: u32,
    ) -> impl Iterator<Item = (u32, &Endpoint)> + '_ {
        (0u32..)
            .zip(self.members.iter())
            .filter(move |(i, _)| *i != index)
    }
}

pub fn hostname_for(
    template: &str,
    index: u32,
) -> String {
    template.replace("{index}", &index.to_string())
}
