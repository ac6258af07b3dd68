//! Configuration management for the node lifecycle coordinator.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`FALKORDB__SECTION__KEY`)
//! - Secrets read from mounted files in preference to plain values
//! - Component-wise validation, performed once at process start
mod cluster;
mod credentials;
mod maintenance;
mod monitor;
mod monitoring;
mod node;
mod persistence;
mod retry;
mod tls;
pub use cluster::*;
pub use credentials::*;
pub use maintenance::*;
pub use monitor::*;
pub use monitoring::*;
pub use node::*;
pub use persistence::*;
pub use retry::*;
pub use tls::*;


use std::env;
use std::fmt::Debug;
use std::path::Path;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

pub const ENV_PREFIX: &str = "FALKORDB";

/// Main configuration container for the coordinator.
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct CoordinatorConfig {
    /// Identity, ports, topology mode and engine launch parameters
    #[serde(default)]
    pub node: NodeConfig,
    /// Peer naming convention
    #[serde(default)]
    pub peers: PeersConfig,
    /// Quorum monitor (sentinel) settings
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Sharded topology settings
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Memory ceiling, snapshot cadence and fsync policy
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Credential material
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// TLS transport settings
    #[serde(default)]
    pub tls: TlsConfig,
    /// Health endpoint settings
    #[serde(default)]
    pub health: HealthConfig,
    /// Periodic background jobs
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Retry policies for every blocking wait
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl Debug for CoordinatorConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CoordinatorConfig")
            .field("node", &self.node)
            .field("peers", &self.peers)
            .field("monitor", &self.monitor)
            .field("cluster", &self.cluster)
            .finish()
    }
}

impl CoordinatorConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `FALKORDB__` prefix (highest priority)
    ///
    /// # Note
    /// Callers MUST call `validate()` before using the configuration.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns the validated, immutable instance.
    ///
    /// Also resolves derived values: the node index (from the hostname
    /// suffix when unset) and secrets from mounted files.
    pub fn validate(mut self) -> Result<Self> {
        self.credentials.load_secrets()?;
        self.credentials.validate()?;
        self.node.validate()?;
        self.peers.validate(&self.node)?;
        self.monitor.validate(self.node.topology)?;
        self.cluster.validate(self.node.topology, self.peers.host_count)?;
        self.persistence.validate()?;
        self.tls.validate()?;
        self.health.validate()?;
        self.maintenance.validate()?;
        self.retry.validate()?;
        Ok(self)
    }

    /// Node index resolved during validation.
    pub fn node_index(&self) -> u32 {
        self.node.index.unwrap_or_default()
    }

    pub fn is_bootstrap_node(&self) -> bool {
        self.node_index() == self.cluster.creator_index
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

pub(crate) fn invalid(msg: impl Into<String>) -> Error {
    Error::Config(ConfigError::Message(msg.into()))
}

/// Ensures directory path is valid and writable
pub(super) fn validate_directory(
    path: &Path,
    name: &str,
) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(invalid(format!("{name} path cannot be empty")));
    }

    #[cfg(not(test))]
    {
        use std::fs;
        // Check directory existence or create ability
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| {
                invalid(format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    path.display(),
                    e
                ))
            })?;
        }

        // Check write permissions
        let test_file = path.join(".permission_test");
        fs::write(&test_file, b"test").map_err(|e| {
            invalid(format!(
                "No write permission in {} directory {}: {}",
                name,
                path.display(),
                e
            ))
        })?;
        fs::remove_file(&test_file).ok();
    }

    Ok(())
}
