use std::path::PathBuf;

use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::engine::EngineAdmin;
use crate::metrics::DRIFT_REWRITES;
use crate::metrics::PEER_REINTRODUCTIONS;
use crate::topology::NodeEntry;
use crate::topology::TopologyRecord;
use crate::utils::file_io::read_optional;
use crate::utils::file_io::write_atomically;
use crate::NodeIdentity;
use crate::PeerResolver;
use crate::Result;
use crate::RetryPolicy;

/// What the on-disk record said about this node before the engine started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedSelf {
    /// The self address was rewritten to the current one
    pub rewritten: bool,
    /// Identifier of the primary this node replicated from
    pub upstream: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub reintroduced: Vec<String>,
    pub failed: Vec<String>,
    /// Stale peers without an announced hostname, left to gossip
    pub skipped: Vec<String>,
    pub upstream_repaired: bool,
}

pub struct TopologyDriftReconciler {
    resolver: PeerResolver,
    record_path: PathBuf,
    reintroduction: RetryPolicy,
}

impl TopologyDriftReconciler {
    pub fn new(
        resolver: PeerResolver,
        record_path: impl Into<PathBuf>,
        reintroduction: RetryPolicy,
    ) -> Self {
        Self {
            resolver,
            record_path: record_path.into(),
            reintroduction,
        }
    }

    /// Points the self entry of the record at `me.address`. Runs before the
    /// engine reads the file; nothing but the address bytes changes.
    ///
    /// A missing record means first boot and yields `None`.
    #[instrument(skip(self, me), fields(address = %me.address))]
    pub async fn reconcile_record(
        &self,
        me: &NodeIdentity,
    ) -> Result<Option<RecordedSelf>> {
        let Some(text) = read_optional(&self.record_path).await? else {
            debug!("no topology record at {}", self.record_path.display());
            return Ok(None);
        };

        let mut record = TopologyRecord::parse(&text)?;
        let recorded = record.self_entry()?;
        let upstream = recorded.is_replica().then(|| recorded.primary_id.clone()).flatten();
        let previous = recorded.ip.clone();

        let rewritten = record.rewrite_self_address(&me.address.to_string())?;
        if rewritten {
            write_atomically(&self.record_path, record.render().as_bytes()).await?;
            DRIFT_REWRITES.inc();
            info!("self address in topology record moved from {previous:?} to {}", me.address);
        }
        Ok(Some(RecordedSelf { rewritten, upstream }))
    }

    /// Re-introduces stale peers and repairs this replica's upstream against
    /// the engine's live member table. Per-peer failures are logged only.
    #[instrument(skip_all)]
    pub async fn reconcile_live(
        &self,
        admin: &dyn EngineAdmin,
        recorded_upstream: Option<&str>,
    ) -> Result<ReconcileReport> {
        let live = TopologyRecord::parse(&admin.cluster_nodes().await?)?;
        let mut report = ReconcileReport::default();

        for peer in live.stale_peers() {
            let Some(hostname) = peer.hostname.as_deref() else {
                debug!("stale peer {} announces no hostname, leaving it to gossip", peer.id);
                PEER_REINTRODUCTIONS.with_label_values(&["skipped"]).inc();
                report.skipped.push(peer.id.clone());
                continue;
            };
            match self.reintroduce(admin, hostname, peer).await {
                Ok(()) => {
                    PEER_REINTRODUCTIONS.with_label_values(&["ok"]).inc();
                    report.reintroduced.push(hostname.to_string());
                }
                Err(e) => {
                    PEER_REINTRODUCTIONS.with_label_values(&["failed"]).inc();
                    warn!("could not re-introduce {hostname}: {e}");
                    report.failed.push(hostname.to_string());
                }
            }
        }

        if let Some(recorded) = recorded_upstream {
            report.upstream_repaired = self.repair_upstream(admin, &live, recorded).await?;
        }
        Ok(report)
    }

    async fn reintroduce(
        &self,
        admin: &dyn EngineAdmin,
        hostname: &str,
        peer: &NodeEntry,
    ) -> Result<()> {
        let resolved = self
            .resolver
            .resolve(hostname, peer.port, &self.reintroduction)
            .await?;
        let ip = resolved
            .primary_addr()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| peer.ip.clone());
        admin.cluster_meet(&ip, peer.port, peer.bus_port).await?;
        info!("re-introduced {hostname} at {ip}:{}", peer.port);
        Ok(())
    }

    /// Keeps the current upstream when it is a healthy member; otherwise
    /// re-points at the identifier the record held. Identifiers survive
    /// address changes, names in DNS may not.
    async fn repair_upstream(
        &self,
        admin: &dyn EngineAdmin,
        live: &TopologyRecord,
        recorded: &str,
    ) -> Result<bool> {
        let me = live.self_entry()?;
        let healthy_upstream = me
            .primary_id
            .as_deref()
            .and_then(|id| live.entry(id))
            .is_some_and(|upstream| !upstream.is_stale());
        if healthy_upstream {
            return Ok(false);
        }
        if live.entry(recorded).is_none() {
            warn!("recorded upstream {recorded} is not part of the topology");
            return Ok(false);
        }
        admin.cluster_replicate(recorded).await?;
        info!("re-pointed replication to recorded upstream {recorded}");
        Ok(true)
    }
}
