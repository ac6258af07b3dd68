use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use super::validate_directory;
use crate::Result;

/// Deployment shape the node participates in.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TopologyMode {
    /// Single primary, no replication
    #[default]
    Standalone,
    /// Primary/replica, optionally supervised by a quorum monitor
    Replicated,
    /// Sharded cluster with per-shard replicas
    Sharded,
}

impl fmt::Display for TopologyMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            TopologyMode::Standalone => write!(f, "standalone"),
            TopologyMode::Replicated => write!(f, "replicated"),
            TopologyMode::Sharded => write!(f, "sharded"),
        }
    }
}

/// Node identity, listening ports and engine launch parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeConfig {
    /// Logical hostname of this node, e.g. `node-2.node-hs.ns.svc.cluster.local`
    #[serde(default = "default_name")]
    pub name: String,

    /// Position in the peer set. Derived from the trailing `-N` of the first
    /// hostname label when unset.
    #[serde(default)]
    pub index: Option<u32>,

    /// Externally resolvable name, used for TLS connections and announcements
    #[serde(default)]
    pub external_host: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Cluster bus port; defaults to `port + 10000`
    #[serde(default)]
    pub bus_port: Option<u16>,

    #[serde(default)]
    pub topology: TopologyMode,

    /// Engine data directory (AOF/RDB, topology record, formation marker)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Engine server binary
    #[serde(default = "default_engine_binary")]
    pub engine_binary: String,

    /// Graph module shared object loaded at startup
    #[serde(default = "default_module_path")]
    pub module_path: String,

    /// Extra arguments appended to the module load directive
    #[serde(default)]
    pub module_args: String,

    /// Engine configuration file name, relative to `data_dir`
    #[serde(default = "default_engine_config_file")]
    pub engine_config_file: String,

    /// Template used when no engine configuration exists yet
    #[serde(default)]
    pub config_template: Option<PathBuf>,

    /// Engine log verbosity (`debug`, `verbose`, `notice`, `warning`)
    #[serde(default = "default_engine_log_level")]
    pub engine_log_level: String,

    /// Delay after the engine accepts connections before admin commands are sent
    #[serde(default = "default_engine_warmup_ms")]
    pub engine_warmup_ms: u64,

    /// Time the engine gets to exit after the shutdown command
    #[serde(default = "default_engine_stop_timeout_ms")]
    pub engine_stop_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            index: None,
            external_host: None,
            port: default_port(),
            bus_port: None,
            topology: TopologyMode::default(),
            data_dir: default_data_dir(),
            engine_binary: default_engine_binary(),
            module_path: default_module_path(),
            module_args: String::new(),
            engine_config_file: default_engine_config_file(),
            config_template: None,
            engine_log_level: default_engine_log_level(),
            engine_warmup_ms: default_engine_warmup_ms(),
            engine_stop_timeout_ms: default_engine_stop_timeout_ms(),
        }
    }
}

impl NodeConfig {
    pub fn validate(&mut self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("node.name cannot be empty"));
        }

        if self.port == 0 {
            return Err(invalid("node.port must be non-zero"));
        }

        if self.bus_port() == self.port {
            return Err(invalid("node.bus_port must differ from node.port"));
        }

        if !matches!(
            self.engine_log_level.as_str(),
            "debug" | "verbose" | "notice" | "warning"
        ) {
            return Err(invalid(format!(
                "node.engine_log_level {} is not one of debug, verbose, notice, warning",
                self.engine_log_level
            )));
        }

        if self.index.is_none() {
            self.index = index_from_hostname(&self.name);
        }
        if self.index.is_none() {
            return Err(invalid(format!(
                "node.index unset and cannot be derived from hostname {}",
                self.name
            )));
        }

        validate_directory(&self.data_dir, "node.data_dir")?;
        Ok(())
    }

    pub fn bus_port(&self) -> u16 {
        self.bus_port.unwrap_or_else(|| self.port.wrapping_add(10000))
    }

    pub fn engine_config_path(&self) -> PathBuf {
        self.data_dir.join(&self.engine_config_file)
    }

    /// Name peers and clients use to reach this node.
    pub fn announce_host(&self) -> &str {
        self.external_host.as_deref().unwrap_or(&self.name)
    }
}

/// Naming convention that yields the peer set
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeersConfig {
    /// Hostname pattern with an `{index}` placeholder,
    /// e.g. `node-{index}.node-hs.default.svc.cluster.local`
    #[serde(default = "default_hostname_template")]
    pub hostname_template: String,

    /// Number of engine nodes in the deployment
    #[serde(default = "default_host_count")]
    pub host_count: u32,

    /// Pause after a peer first answers, letting its view converge
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Per-probe timeout for liveness and topology checks
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            hostname_template: default_hostname_template(),
            host_count: default_host_count(),
            settle_delay_ms: default_settle_delay_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl PeersConfig {
    pub fn validate(
        &self,
        node: &NodeConfig,
    ) -> Result<()> {
        if self.host_count == 0 {
            return Err(invalid("peers.host_count must be at least 1"));
        }

        if node.topology != TopologyMode::Standalone && !self.hostname_template.contains("{index}") {
            return Err(invalid(format!(
                "peers.hostname_template {} must contain an {{index}} placeholder",
                self.hostname_template
            )));
        }

        let index = node.index.unwrap_or_default();
        if index >= self.host_count {
            return Err(invalid(format!(
                "node index {} outside peer set of {} hosts",
                index, self.host_count
            )));
        }
        Ok(())
    }
}

/// `node-3.node-hs.ns.svc` => 3
pub fn index_from_hostname(name: &str) -> Option<u32> {
    let label = name.split('.').next()?;
    let (_, suffix) = label.rsplit_once('-')?;
    suffix.parse().ok()
}

fn default_name() -> String {
    "node-0".into()
}
fn default_port() -> u16 {
    6379
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}
fn default_engine_binary() -> String {
    "redis-server".into()
}
fn default_module_path() -> String {
    "/FalkorDB/bin/src/falkordb.so".into()
}
fn default_engine_config_file() -> String {
    "node.conf".into()
}
fn default_engine_log_level() -> String {
    "notice".into()
}
fn default_engine_warmup_ms() -> u64 {
    10_000
}
fn default_engine_stop_timeout_ms() -> u64 {
    30_000
}
fn default_hostname_template() -> String {
    "node-{index}".into()
}
fn default_host_count() -> u32 {
    1
}
fn default_settle_delay_ms() -> u64 {
    2000
}
fn default_probe_timeout_ms() -> u64 {
    3000
}
