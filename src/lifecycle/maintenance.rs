use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use tokio::sync::watch;
use tokio::sync::Mutex;
use tokio::time::interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::engine::EngineAdmin;
use crate::utils::file_io::file_stat;
use crate::Result;

/// Starts a rewrite of the append-only log once it outgrows `threshold`.
/// Returns whether a rewrite was requested.
pub async fn compact_if_large(
    admin: &dyn EngineAdmin,
    threshold: u64,
) -> Result<bool> {
    let report = admin.info("persistence").await?;
    if !report.aof_enabled() || report.aof_rewrite_active() {
        return Ok(false);
    }
    match report.aof_current_size() {
        Some(size) if size > threshold => {
            info!("append-only log at {size} bytes exceeds {threshold}, rewriting");
            admin.bgrewriteaof().await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Reloads the engine's TLS material when the certificate file changes.
pub struct CertificateWatcher {
    cert_path: PathBuf,
    key_path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl CertificateWatcher {
    pub async fn new(
        cert_path: PathBuf,
        key_path: PathBuf,
    ) -> Self {
        let last_modified = match file_stat(&cert_path).await {
            Ok(stat) => stat.map(|(_, modified)| modified),
            Err(e) => {
                warn!("cannot stat certificate {}: {e}", cert_path.display());
                None
            }
        };
        Self {
            cert_path,
            key_path,
            last_modified,
        }
    }

    /// Returns whether a reload was pushed to the engine.
    pub async fn check(
        &mut self,
        admin: &dyn EngineAdmin,
    ) -> Result<bool> {
        let modified = match file_stat(&self.cert_path).await? {
            Some((_, modified)) => modified,
            None => {
                debug!("certificate {} not present", self.cert_path.display());
                return Ok(false);
            }
        };
        if self.last_modified == Some(modified) {
            return Ok(false);
        }

        // Setting the paths again makes the engine re-read both files.
        admin
            .config_set("tls-cert-file", &self.cert_path.display().to_string())
            .await?;
        admin
            .config_set("tls-key-file", &self.key_path.display().to_string())
            .await?;
        self.last_modified = Some(modified);
        info!("reloaded TLS certificate {}", self.cert_path.display());
        Ok(true)
    }
}

/// Runs `job` every `period` until shutdown. A zero period disables the job.
pub(crate) async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<()>,
    mut job: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    if period.is_zero() {
        debug!("{name} disabled");
        return Ok(());
    }
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("{name} stopping");
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(e) = job().await {
                    warn!("{name} failed: {e}");
                }
            }
        }
    }
}

/// Append-only log compaction loop.
pub(crate) async fn aof_maintenance(
    admin: Arc<dyn EngineAdmin>,
    threshold: u64,
    period: Duration,
    shutdown: watch::Receiver<()>,
) -> Result<()> {
    run_periodic("aof maintenance", period, shutdown, || {
        let admin = admin.clone();
        async move { compact_if_large(admin.as_ref(), threshold).await.map(|_| ()) }
    })
    .await
}

/// Certificate rotation loop.
pub(crate) async fn certificate_maintenance(
    admin: Arc<dyn EngineAdmin>,
    watcher: CertificateWatcher,
    period: Duration,
    shutdown: watch::Receiver<()>,
) -> Result<()> {
    let watcher = Arc::new(Mutex::new(watcher));
    run_periodic("certificate reload", period, shutdown, || {
        let admin = admin.clone();
        let watcher = watcher.clone();
        async move { watcher.lock().await.check(admin.as_ref()).await.map(|_| ()) }
    })
    .await
}
