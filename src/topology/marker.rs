use std::path::Path;
use std::path::PathBuf;

use tracing::info;
use tracing::warn;

use crate::utils::file_io::create_new;
use crate::Result;

/// Write-once guard recording that this data volume already created or
/// joined a topology. Never cleared by the coordinator.
#[derive(Debug, Clone)]
pub struct FormationMarker {
    path: PathBuf,
}

impl FormationMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn is_set(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Sets the marker; a marker that already exists is left as it is.
    pub async fn set(
        &self,
        action: &str,
    ) -> Result<()> {
        if create_new(&self.path, format!("{action}\n").as_bytes()).await? {
            info!("formation marker set at {} ({action})", self.path.display());
        } else {
            warn!("formation marker {} already present", self.path.display());
        }
        Ok(())
    }
}
