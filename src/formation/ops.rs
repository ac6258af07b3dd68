use std::process::Stdio;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::debug;
use tracing::info;

use crate::engine::Connector;
use crate::engine::InfoReport;
use crate::CoordinatorConfig;
use crate::EngineError;
use crate::Endpoint;
use crate::ProcessError;
use crate::Result;

/// Topology-level operations against cluster members.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Whether the engine at `host:port` is part of a topology that already
    /// has slots assigned.
    async fn topology_formed(
        &self,
        host: &str,
        port: u16,
    ) -> Result<bool>;

    /// Members the engine at `host:port` knows, itself included.
    async fn known_members(
        &self,
        host: &str,
        port: u16,
    ) -> Result<u64>;

    /// Creates the topology from `members` with `replicas` per primary.
    async fn create(
        &self,
        members: Vec<Endpoint>,
        replicas: u32,
    ) -> Result<()>;

    /// Adds `new` to the topology `existing` belongs to.
    async fn add_member(
        &self,
        new: Endpoint,
        existing: Endpoint,
        as_replica: bool,
    ) -> Result<()>;
}

pub fn create_args(
    members: &[Endpoint],
    replicas: u32,
) -> Vec<String> {
    let mut args = vec!["--cluster".to_string(), "create".to_string()];
    args.extend(members.iter().map(Endpoint::to_string));
    args.extend([
        "--cluster-replicas".to_string(),
        replicas.to_string(),
        "--cluster-yes".to_string(),
    ]);
    args
}

pub fn add_member_args(
    new: &Endpoint,
    existing: &Endpoint,
    as_replica: bool,
) -> Vec<String> {
    let mut args = vec![
        "--cluster".to_string(),
        "add-node".to_string(),
        new.to_string(),
        existing.to_string(),
    ];
    if as_replica {
        args.push("--cluster-slave".to_string());
    }
    args
}

/// [`ClusterOps`] driving the engine's command-line tool for topology changes
/// and the admin protocol for probes.
#[derive(Debug, Clone)]
pub struct CliClusterOps {
    connector: Connector,
    binary: String,
    password: String,
    tls_args: Vec<String>,
}

impl CliClusterOps {
    pub fn from_config(
        config: &CoordinatorConfig,
        connector: Connector,
    ) -> Self {
        let tls = &config.tls;
        let mut tls_args = Vec::new();
        if tls.enable_tls {
            tls_args.extend([
                "--tls".to_string(),
                "--cert".to_string(),
                tls.cert_path.display().to_string(),
                "--key".to_string(),
                tls.key_path.display().to_string(),
            ]);
            if tls.insecure_skip_verify {
                tls_args.push("--insecure".to_string());
            } else {
                tls_args.extend(["--cacert".to_string(), tls.ca_cert_path.display().to_string()]);
            }
        }
        Self {
            connector,
            binary: config.cluster.cli_binary.clone(),
            password: config.credentials.admin_password.clone(),
            tls_args,
        }
    }

    async fn cluster_info(
        &self,
        host: &str,
        port: u16,
    ) -> Result<InfoReport> {
        let text: String = self
            .connector
            .query(host, port, "CLUSTER INFO", redis::cmd("CLUSTER").arg("INFO"))
            .await?;
        Ok(InfoReport::parse(&text))
    }

    /// Runs the tool once; the password travels in the environment so it
    /// stays out of the process list.
    async fn run_tool(
        &self,
        action: &'static str,
        args: Vec<String>,
    ) -> Result<()> {
        debug!("{} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(&self.tls_args)
            .args(&args)
            .env("REDISCLI_AUTH", &self.password)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ProcessError::Spawn {
                name: self.binary.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            debug!("{action}: {line}");
        }
        // The tool reports some failures with a zero status.
        if !output.status.success() || stdout.contains("[ERR]") {
            return Err(EngineError::ToolFailed {
                action,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterOps for CliClusterOps {
    async fn topology_formed(
        &self,
        host: &str,
        port: u16,
    ) -> Result<bool> {
        Ok(self.cluster_info(host, port).await?.cluster_slots_assigned() > 0)
    }

    async fn known_members(
        &self,
        host: &str,
        port: u16,
    ) -> Result<u64> {
        Ok(self.cluster_info(host, port).await?.cluster_known_nodes())
    }

    async fn create(
        &self,
        members: Vec<Endpoint>,
        replicas: u32,
    ) -> Result<()> {
        self.run_tool("create", create_args(&members, replicas)).await?;
        info!("cluster created from {} members", members.len());
        Ok(())
    }

    async fn add_member(
        &self,
        new: Endpoint,
        existing: Endpoint,
        as_replica: bool,
    ) -> Result<()> {
        self.run_tool("add-node", add_member_args(&new, &existing, as_replica))
            .await?;
        info!("{new} added via {existing} (replica: {as_replica})");
        Ok(())
    }
}
