use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::debug;
use tracing::info;
use warp::http::StatusCode;
use warp::reply::WithStatus;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::engine::EngineAdmin;
use crate::engine::InfoReport;
use crate::lifecycle::LifecyclePhase;
use crate::lifecycle::NodeStatus;
use crate::metrics::metrics_body;
use crate::monitor::QuorumMonitor;
use crate::CoordinatorConfig;
use crate::TopologyMode;

/// What the handlers consult on each request.
#[derive(Clone)]
pub struct HealthState {
    pub status: Arc<NodeStatus>,
    pub admin: Arc<dyn EngineAdmin>,
    pub topology: TopologyMode,
    pub probe_timeout: Duration,
    /// Set when the node runs with a quorum monitor
    pub monitor: Option<Arc<dyn QuorumMonitor>>,
    pub group: String,
}

impl HealthState {
    pub fn from_config(
        config: &CoordinatorConfig,
        status: Arc<NodeStatus>,
        admin: Arc<dyn EngineAdmin>,
        monitor: Option<Arc<dyn QuorumMonitor>>,
    ) -> Self {
        Self {
            status,
            admin,
            topology: config.node.topology,
            probe_timeout: Duration::from_millis(config.health.probe_timeout_ms),
            monitor,
            group: config.monitor.group_name.clone(),
        }
    }

    async fn engine_answers(&self) -> bool {
        matches!(timeout(self.probe_timeout, self.admin.ping()).await, Ok(Ok(())))
    }

    async fn info(
        &self,
        section: &'static str,
    ) -> Option<InfoReport> {
        match timeout(self.probe_timeout, self.admin.info(section)).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                debug!("INFO {section} failed: {e}");
                None
            }
            Err(_) => {
                debug!("INFO {section} timed out");
                None
            }
        }
    }

    /// Whether the monitor answers and tracks a primary for the group.
    async fn monitor_tracks_group(
        &self,
        monitor: &dyn QuorumMonitor,
    ) -> bool {
        match timeout(self.probe_timeout, monitor.primary_address(&self.group)).await {
            Ok(Ok(primary)) => primary.is_some(),
            Ok(Err(e)) => {
                debug!("monitor query for {} failed: {e}", self.group);
                false
            }
            Err(_) => {
                debug!("monitor query for {} timed out", self.group);
                false
            }
        }
    }

    async fn cluster_info(&self) -> Option<InfoReport> {
        timeout(self.probe_timeout, self.admin.cluster_info())
            .await
            .ok()
            .and_then(|r| r.ok())
    }
}

/// Ready once the lifecycle says so and replication (and the topology, when
/// sharded) is healthy.
pub fn readiness_verdict(
    phase: LifecyclePhase,
    topology: TopologyMode,
    replication: &InfoReport,
    cluster: Option<&InfoReport>,
) -> bool {
    if phase != LifecyclePhase::Ready {
        return false;
    }
    let replication_ok = replication.is_primary() || (replication.link_up() && !replication.sync_in_progress());
    let cluster_ok = topology != TopologyMode::Sharded || cluster.is_some_and(InfoReport::cluster_state_ok);
    replication_ok && cluster_ok
}

/// A replica in the middle of a full resync is not live.
pub fn liveness_verdict(
    engine_answers: bool,
    replication: Option<&InfoReport>,
) -> bool {
    engine_answers && !replication.is_some_and(|r| !r.is_primary() && r.sync_in_progress())
}

fn verdict(ok: bool) -> WithStatus<&'static str> {
    if ok {
        warp::reply::with_status("OK", StatusCode::OK)
    } else {
        warp::reply::with_status("Not ready", StatusCode::INTERNAL_SERVER_ERROR)
    }
}

async fn startup_handler(state: HealthState) -> Result<impl Reply, Rejection> {
    Ok(verdict(state.engine_answers().await))
}

async fn readiness_handler(state: HealthState) -> Result<impl Reply, Rejection> {
    let phase = state.status.phase();
    if phase != LifecyclePhase::Ready {
        return Ok(verdict(false));
    }
    let Some(replication) = state.info("replication").await else {
        return Ok(verdict(false));
    };
    let cluster = match state.topology {
        TopologyMode::Sharded => state.cluster_info().await,
        _ => None,
    };
    Ok(verdict(readiness_verdict(phase, state.topology, &replication, cluster.as_ref())))
}

async fn liveness_handler(state: HealthState) -> Result<impl Reply, Rejection> {
    if !state.engine_answers().await {
        return Ok(verdict(false));
    }
    let replication = state.info("replication").await;
    Ok(verdict(liveness_verdict(true, replication.as_ref())))
}

async fn monitor_handler(state: HealthState) -> Result<impl Reply, Rejection> {
    let Some(monitor) = state.monitor.clone() else {
        return Err(warp::reject::not_found());
    };
    Ok(verdict(state.monitor_tracks_group(monitor.as_ref()).await))
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(metrics_body())
}

fn with_state(state: HealthState) -> impl Filter<Extract = (HealthState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// `/startup`, `/readiness`, `/healthcheck` (same as readiness), `/liveness`,
/// `/monitor` and `/metrics`.
pub fn routes(state: HealthState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let startup = warp::path!("startup")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(startup_handler);
    let readiness = warp::path!("readiness")
        .or(warp::path!("healthcheck"))
        .unify()
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(readiness_handler);
    let liveness = warp::path!("liveness")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(liveness_handler);
    let monitor = warp::path!("monitor")
        .and(warp::get())
        .and(with_state(state))
        .and_then(monitor_handler);
    let metrics = warp::path!("metrics").and(warp::get()).and_then(metrics_handler);

    startup.or(readiness).or(liveness).or(monitor).or(metrics)
}

pub async fn start_server(
    port: u16,
    state: HealthState,
    mut shutdown_signal: watch::Receiver<()>,
) {
    info!("health endpoints listening on port {port}");
    let (_, server) = warp::serve(routes(state)).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
        let _ = shutdown_signal.changed().await;
    });
    server.await;
}
