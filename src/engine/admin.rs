use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::debug;
use tracing::info;

use super::Connector;
use super::InfoReport;
use crate::constants::PONG;
use crate::constants::REWRITE_IN_PROGRESS_REPLY;
use crate::EngineError;
use crate::Error;
use crate::Result;
use crate::SystemError;

/// Administrative commands against the local engine.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EngineAdmin: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// `INFO <section>`
    async fn info(
        &self,
        section: &'static str,
    ) -> Result<InfoReport>;

    /// Resets `user` to exactly `rules` plus the given password.
    async fn set_acl_user(
        &self,
        user: &str,
        password: &str,
        rules: Vec<String>,
    ) -> Result<()>;

    async fn config_set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()>;

    async fn config_rewrite(&self) -> Result<()>;

    /// Starts an append-only log rewrite; an already running one counts.
    async fn bgrewriteaof(&self) -> Result<()>;

    async fn cluster_info(&self) -> Result<InfoReport>;

    /// Raw `CLUSTER NODES` table
    async fn cluster_nodes(&self) -> Result<String>;

    async fn cluster_meet(
        &self,
        ip: &str,
        port: u16,
        bus_port: u16,
    ) -> Result<()>;

    async fn cluster_replicate(
        &self,
        node_id: &str,
    ) -> Result<()>;

    /// Stops the engine; a dropped connection is the expected reply.
    async fn shutdown(&self) -> Result<()>;
}

/// [`EngineAdmin`] over the wire to `host:port`.
#[derive(Debug, Clone)]
pub struct RedisEngineAdmin {
    connector: Connector,
    host: String,
    port: u16,
}

impl RedisEngineAdmin {
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

    async fn run<T: redis::FromRedisValue>(
        &self,
        command: &'static str,
        cmd: &redis::Cmd,
    ) -> Result<T> {
        self.connector.query(&self.host, self.port, command, cmd).await
    }
}

#[async_trait]
impl EngineAdmin for RedisEngineAdmin {
    async fn ping(&self) -> Result<()> {
        let reply: String = self.run("PING", &redis::cmd("PING")).await?;
        if reply == PONG {
            Ok(())
        } else {
            Err(EngineError::UnexpectedResponse {
                command: "PING",
                detail: reply,
            }
            .into())
        }
    }

    async fn info(
        &self,
        section: &'static str,
    ) -> Result<InfoReport> {
        let text: String = self.run("INFO", redis::cmd("INFO").arg(section)).await?;
        Ok(InfoReport::parse(&text))
    }

    async fn set_acl_user(
        &self,
        user: &str,
        password: &str,
        rules: Vec<String>,
    ) -> Result<()> {
        let mut cmd = redis::cmd("ACL");
        cmd.arg("SETUSER").arg(user).arg("reset").arg(format!(">{password}"));
        for rule in &rules {
            cmd.arg(rule);
        }
        self.run::<()>("ACL SETUSER", &cmd).await?;
        info!("access rules applied for user {user}");
        Ok(())
    }

    async fn config_set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<()> {
        debug!("CONFIG SET {key} {value}");
        self.run("CONFIG SET", redis::cmd("CONFIG").arg("SET").arg(key).arg(value))
            .await
    }

    async fn config_rewrite(&self) -> Result<()> {
        self.run("CONFIG REWRITE", redis::cmd("CONFIG").arg("REWRITE")).await
    }

    async fn bgrewriteaof(&self) -> Result<()> {
        match self.run::<String>("BGREWRITEAOF", &redis::cmd("BGREWRITEAOF")).await {
            Ok(reply) => {
                debug!("BGREWRITEAOF: {reply}");
                Ok(())
            }
            Err(Error::System(SystemError::Engine(EngineError::Command { source, .. })))
                if source.to_string().contains(REWRITE_IN_PROGRESS_REPLY) =>
            {
                debug!("append-only rewrite already running");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn cluster_info(&self) -> Result<InfoReport> {
        let text: String = self.run("CLUSTER INFO", redis::cmd("CLUSTER").arg("INFO")).await?;
        Ok(InfoReport::parse(&text))
    }

    async fn cluster_nodes(&self) -> Result<String> {
        self.run("CLUSTER NODES", redis::cmd("CLUSTER").arg("NODES")).await
    }

    async fn cluster_meet(
        &self,
        ip: &str,
        port: u16,
        bus_port: u16,
    ) -> Result<()> {
        self.run(
            "CLUSTER MEET",
            redis::cmd("CLUSTER").arg("MEET").arg(ip).arg(port).arg(bus_port),
        )
        .await
    }

    async fn cluster_replicate(
        &self,
        node_id: &str,
    ) -> Result<()> {
        self.run("CLUSTER REPLICATE", redis::cmd("CLUSTER").arg("REPLICATE").arg(node_id))
            .await
    }

    async fn shutdown(&self) -> Result<()> {
        match self.run::<()>("SHUTDOWN", &redis::cmd("SHUTDOWN")).await {
            Ok(()) => Ok(()),
            Err(Error::System(SystemError::Engine(EngineError::Command { source, .. })))
                if source.is_connection_dropped() || source.is_io_error() =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
