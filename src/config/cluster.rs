use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use super::TopologyMode;
use crate::Result;

/// Sharded topology parameters.
///
/// Cluster creation is pinned to `creator_index`: that node must exist when
/// the cluster is first formed and should be the last one scaled down.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Replicas per shard primary
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Index of the node allowed to create the topology
    #[serde(default)]
    pub creator_index: u32,

    /// Peers a non-creator probes per pass looking for a formed topology
    #[serde(default = "default_probe_witnesses")]
    pub probe_witnesses: u32,

    /// Smallest host count a cluster may be created with
    #[serde(default = "default_min_host_count")]
    pub min_host_count: u32,

    /// Formation marker file name, relative to the node data directory
    #[serde(default = "default_marker_file")]
    pub marker_file: String,

    /// Topology record file name, relative to the node data directory
    #[serde(default = "default_record_file")]
    pub record_file: String,

    /// Node timeout pushed to the engine, in milliseconds
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,

    /// Delay before scanning the topology for stale peers after boot
    #[serde(default = "default_drift_rescan_delay_ms")]
    pub drift_rescan_delay_ms: u64,

    /// Tool used to create the topology and add members
    #[serde(default = "default_cli_binary")]
    pub cli_binary: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            creator_index: 0,
            probe_witnesses: default_probe_witnesses(),
            min_host_count: default_min_host_count(),
            marker_file: default_marker_file(),
            record_file: default_record_file(),
            node_timeout_ms: default_node_timeout_ms(),
            drift_rescan_delay_ms: default_drift_rescan_delay_ms(),
            cli_binary: default_cli_binary(),
        }
    }
}

impl ClusterConfig {
    pub fn validate(
        &self,
        topology: TopologyMode,
        host_count: u32,
    ) -> Result<()> {
        if topology != TopologyMode::Sharded {
            return Ok(());
        }

        if host_count < self.min_host_count {
            return Err(invalid(format!(
                "sharded topology needs at least {} hosts, peers.host_count is {}",
                self.min_host_count, host_count
            )));
        }

        let group = self.group_size();
        if host_count % group != 0 {
            return Err(invalid(format!(
                "peers.host_count {} is not a multiple of the shard group size {}",
                host_count, group
            )));
        }

        if self.creator_index >= host_count {
            return Err(invalid(format!(
                "cluster.creator_index {} outside peer set of {} hosts",
                self.creator_index, host_count
            )));
        }

        if self.probe_witnesses == 0 {
            return Err(invalid("cluster.probe_witnesses must be at least 1"));
        }
        Ok(())
    }

    /// Primary plus its replicas.
    pub fn group_size(&self) -> u32 {
        self.replicas + 1
    }

    /// Nodes at the head of a shard group join as primaries.
    pub fn joins_as_replica(
        &self,
        index: u32,
    ) -> bool {
        index % self.group_size() != 0
    }
}

fn default_replicas() -> u32 {
    1
}
fn default_probe_witnesses() -> u32 {
    2
}
fn default_min_host_count() -> u32 {
    6
}
fn default_marker_file() -> String {
    "cluster_initialized".into()
}
fn default_record_file() -> String {
    "nodes.conf".into()
}
fn default_node_timeout_ms() -> u64 {
    5000
}
fn default_drift_rescan_delay_ms() -> u64 {
    60_000
}
fn default_cli_binary() -> String {
    "redis-cli".into()
}
