use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::invalid;
use crate::Result;
use crate::StorageError;

/// Credential material for the engine and the quorum monitor.
///
/// Values from mounted secret files take precedence over plain values.
#[derive(Serialize, Deserialize, Clone)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub admin_password: String,

    #[serde(default = "default_admin_password_file")]
    pub admin_password_file: PathBuf,

    /// Restricted user for upgrades and maintenance tooling
    #[serde(default = "default_maintenance_user")]
    pub maintenance_user: String,

    /// Falls back to the admin password when empty
    #[serde(default)]
    pub maintenance_password: String,

    #[serde(default = "default_maintenance_password_file")]
    pub maintenance_password_file: PathBuf,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("admin_password_file", &self.admin_password_file)
            .field("maintenance_user", &self.maintenance_user)
            .finish()
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            admin_password: String::new(),
            admin_password_file: default_admin_password_file(),
            maintenance_user: default_maintenance_user(),
            maintenance_password: String::new(),
            maintenance_password_file: default_maintenance_password_file(),
        }
    }
}

impl CredentialsConfig {
    /// Replaces plain values with the contents of mounted secret files.
    pub fn load_secrets(&mut self) -> Result<()> {
        if let Some(secret) = read_secret(&self.admin_password_file)? {
            debug!("admin password read from {}", self.admin_password_file.display());
            self.admin_password = secret;
        }
        if let Some(secret) = read_secret(&self.maintenance_password_file)? {
            self.maintenance_password = secret;
        }
        if self.maintenance_password.is_empty() {
            self.maintenance_password = self.admin_password.clone();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.admin_password.is_empty() {
            return Err(invalid(format!(
                "admin password missing: set credentials.admin_password or mount {}",
                self.admin_password_file.display()
            )));
        }
        if self.admin_password.contains(char::is_whitespace) {
            return Err(invalid("admin password must not contain whitespace"));
        }
        if self.maintenance_user.trim().is_empty() {
            return Err(invalid("credentials.maintenance_user cannot be empty"));
        }
        Ok(())
    }
}

fn read_secret(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|source| StorageError::PathError {
        path: path.to_path_buf(),
        source,
    })?;
    let secret = raw.trim().to_string();
    Ok((!secret.is_empty()).then_some(secret))
}

fn default_admin_password_file() -> PathBuf {
    PathBuf::from("/run/secrets/adminpassword")
}
fn default_maintenance_user() -> String {
    "falkordbUpgradeUser".into()
}
fn default_maintenance_password_file() -> PathBuf {
    PathBuf::from("/run/secrets/upgradepassword")
}
