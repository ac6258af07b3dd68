use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use redis::Value;
use tracing::debug;
use tracing::info;

use crate::constants::DUPLICATE_GROUP_REPLY;
use crate::engine::Connector;
use crate::CoordinationError;
use crate::EngineError;
use crate::Error;
use crate::Endpoint;
use crate::Result;
use crate::SystemError;

/// One entry of the monitor's `SENTINEL REPLICAS` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorPeer {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub flags: Vec<String>,
}

impl MonitorPeer {
    /// Builds a peer from the field map of one list entry. Entries without an
    /// address are skipped by the caller.
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        let ip = fields.get("ip")?.clone();
        let port = fields.get("port")?.parse().ok()?;
        let name = fields.get("name").cloned().unwrap_or_else(|| format!("{ip}:{port}"));
        let flags = fields
            .get("flags")
            .map(|f| f.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        Some(Self { name, ip, port, flags })
    }

    pub fn has_flag(
        &self,
        flag: &str,
    ) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// Subjectively or objectively down, or disconnected.
    pub fn is_down(&self) -> bool {
        self.has_flag("s_down") || self.has_flag("o_down") || self.has_flag("disconnected")
    }
}

/// Parses a peer-list reply: an array of flat `key, value, ...` arrays.
pub(crate) fn parse_peer_list(reply: &Value) -> Result<Vec<MonitorPeer>> {
    let entries = match reply {
        Value::Bulk(entries) => entries,
        Value::Nil => return Ok(Vec::new()),
        other => {
            return Err(EngineError::UnexpectedResponse {
                command: "SENTINEL peers",
                detail: format!("{other:?}"),
            }
            .into())
        }
    };

    let mut peers = Vec::with_capacity(entries.len());
    for entry in entries {
        let fields: HashMap<String, String> = redis::from_redis_value(entry).map_err(|e| {
            EngineError::UnexpectedResponse {
                command: "SENTINEL peers",
                detail: e.to_string(),
            }
        })?;
        match MonitorPeer::from_fields(&fields) {
            Some(peer) => peers.push(peer),
            None => debug!("monitor peer entry without address skipped: {fields:?}"),
        }
    }
    Ok(peers)
}

/// Administrative protocol of the quorum monitor.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QuorumMonitor: Send + Sync {
    /// Current primary of `group`, `None` while the monitor knows none.
    async fn primary_address(
        &self,
        group: &str,
    ) -> Result<Option<Endpoint>>;

    /// Registers `group`; an existing registration counts as success.
    async fn monitor(
        &self,
        group: &str,
        primary: &Endpoint,
        quorum: u32,
    ) -> Result<()>;

    async fn set(
        &self,
        group: &str,
        option: &str,
        value: &str,
    ) -> Result<()>;

    async fn failover(
        &self,
        group: &str,
    ) -> Result<()>;

    async fn flush_config(&self) -> Result<()>;

    async fn replicas(
        &self,
        group: &str,
    ) -> Result<Vec<MonitorPeer>>;

    /// Forgets replicas and peers of matching groups; returns groups reset.
    async fn reset(
        &self,
        pattern: &str,
    ) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct RedisQuorumMonitor {
    connector: Connector,
    host: String,
    port: u16,
}

impl RedisQuorumMonitor {
    pub fn new(
        connector: Connector,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            connector,
            host: host.into(),
            port,
        }
    }

    async fn sentinel<T: redis::FromRedisValue>(
        &self,
        command: &'static str,
        args: &[&str],
    ) -> Result<T> {
        let mut cmd = redis::cmd("SENTINEL");
        for arg in args {
            cmd.arg(*arg);
        }
        self.connector.query(&self.host, self.port, command, &cmd).await
    }
}

#[async_trait]
impl QuorumMonitor for RedisQuorumMonitor {
    async fn primary_address(
        &self,
        group: &str,
    ) -> Result<Option<Endpoint>> {
        let reply: Option<(String, String)> = self
            .sentinel("SENTINEL GET-MASTER-ADDR-BY-NAME", &["GET-MASTER-ADDR-BY-NAME", group])
            .await?;
        match reply {
            None => Ok(None),
            Some((host, port)) => {
                let port = port.parse().map_err(|_| EngineError::UnexpectedResponse {
                    command: "SENTINEL GET-MASTER-ADDR-BY-NAME",
                    detail: format!("{host} {port}"),
                })?;
                Ok(Some(Endpoint::new(host, port)))
            }
        }
    }

    async fn monitor(
        &self,
        group: &str,
        primary: &Endpoint,
        quorum: u32,
    ) -> Result<()> {
        let port = primary.port.to_string();
        let quorum = quorum.to_string();
        let reply = self
            .sentinel::<()>("SENTINEL MONITOR", &["MONITOR", group, primary.host.as_str(), port.as_str(), quorum.as_str()])
            .await;
        match reply {
            Ok(()) => {
                info!("monitor now watching group {group} at {primary}");
                Ok(())
            }
            Err(Error::System(SystemError::Engine(EngineError::Command { source, .. })))
                if source.to_string().contains(DUPLICATE_GROUP_REPLY) =>
            {
                info!("group {group} already registered with the monitor");
                Ok(())
            }
            Err(Error::System(SystemError::Engine(EngineError::Command { source, .. })))
                if source.kind() == redis::ErrorKind::ResponseError
                    || source.kind() == redis::ErrorKind::ExtensionError =>
            {
                Err(CoordinationError::RegistrationRejected {
                    group: group.to_string(),
                    reason: source.to_string(),
                }
                .into())
            }
            Err(e) => Err(e),
        }
    }

    async fn set(
        &self,
        group: &str,
        option: &str,
        value: &str,
    ) -> Result<()> {
        self.sentinel("SENTINEL SET", &["SET", group, option, value]).await
    }

    async fn failover(
        &self,
        group: &str,
    ) -> Result<()> {
        self.sentinel("SENTINEL FAILOVER", &["FAILOVER", group]).await
    }

    async fn flush_config(&self) -> Result<()> {
        self.sentinel("SENTINEL FLUSHCONFIG", &["FLUSHCONFIG"]).await
    }

    async fn replicas(
        &self,
        group: &str,
    ) -> Result<Vec<MonitorPeer>> {
        let reply: Value = self.sentinel("SENTINEL REPLICAS", &["REPLICAS", group]).await?;
        parse_peer_list(&reply)
    }

    async fn reset(
        &self,
        pattern: &str,
    ) -> Result<u64> {
        self.sentinel("SENTINEL RESET", &["RESET", pattern]).await
    }
}
