use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TlsConfig {
    /// Enables TLS for engine, replication, cluster bus and monitor traffic
    /// Default: false (disabled)
    #[serde(default)]
    pub enable_tls: bool,

    /// Certificate Authority root certificate
    /// Default: "/etc/ssl/certs/ca.pem"
    #[serde(default = "default_ca_path")]
    pub ca_cert_path: PathBuf,

    /// Server certificate chain in PEM format
    /// Default: "/etc/tls/tls.crt"
    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,

    /// Server private key in PEM format
    /// Default: "/etc/tls/tls.key"
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,

    /// Skip certificate verification on coordinator admin connections
    /// Default: false
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enable_tls: false,
            ca_cert_path: default_ca_path(),
            cert_path: default_cert_path(),
            key_path: default_key_path(),
            insecure_skip_verify: false,
        }
    }
}

impl TlsConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enable_tls {
            return Ok(());
        }
        for (name, path) in [
            ("tls.ca_cert_path", &self.ca_cert_path),
            ("tls.cert_path", &self.cert_path),
            ("tls.key_path", &self.key_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(invalid(format!("{name} cannot be empty when TLS is enabled")));
            }
        }
        Ok(())
    }

    /// URL scheme for admin connections.
    pub fn scheme(&self) -> &'static str {
        if self.enable_tls {
            "rediss"
        } else {
            "redis"
        }
    }
}

fn default_ca_path() -> PathBuf {
    PathBuf::from("/etc/ssl/certs/ca.pem")
}
fn default_cert_path() -> PathBuf {
    PathBuf::from("/etc/tls/tls.crt")
}
fn default_key_path() -> PathBuf {
    PathBuf::from("/etc/tls/tls.key")
}
