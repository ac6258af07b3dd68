use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;


lazy_static! {
    pub static ref RETRY_ATTEMPTS: IntCounterVec = IntCounterVec::new(
        Opts::new("retry_attempts_total", "Failed attempts inside retry loops"),
        &["operation"]
    )
    .expect("metric can not be created");

    pub static ref FORMATION_ACTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("formation_actions_total", "Cluster formation decisions taken"),
        &["action"]
    )
    .expect("metric can not be created");

    pub static ref DRIFT_REWRITES: IntCounter = IntCounter::new(
        "drift_self_rewrites_total",
        "Self address rewrites applied to the topology record"
    )
    .expect("metric can not be created");

    pub static ref PEER_REINTRODUCTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("peer_reintroductions_total", "Stale peers re-introduced over the cluster bus"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref SHUTDOWN_OUTCOMES: IntCounterVec = IntCounterVec::new(
        Opts::new("shutdown_steps_total", "Drain steps by outcome"),
        &["step", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref LIFECYCLE_PHASE: IntGauge = IntGauge::new(
        "lifecycle_phase",
        "Current lifecycle phase ordinal (0 = starting, 5 = ready, 7 = stopped)"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new_custom(Some("falkordb_coordinator".to_string()), None)
        .unwrap_or_default();
}

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RETRY_ATTEMPTS.clone()),
        Box::new(FORMATION_ACTIONS.clone()),
        Box::new(DRIFT_REWRITES.clone()),
        Box::new(PEER_REINTRODUCTIONS.clone()),
        Box::new(SHUTDOWN_OUTCOMES.clone()),
        Box::new(LIFECYCLE_PHASE.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {}", e);
        }
    }
}

/// Registers every collector on the crate registry, once per process.
pub fn init_metrics() {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Text exposition of the crate registry.
pub fn metrics_body() -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            warn!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
