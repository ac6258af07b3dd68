use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::aof_maintenance;
use super::certificate_maintenance;
use super::engine_launch_spec;
use super::monitor_launch_spec;
use super::persistence_settings;
use super::system_total_memory;
use super::CertificateWatcher;
use super::Drainer;
use super::LifecyclePhase;
use super::NodeStatus;
use super::Supervisor;
use crate::constants::ADMIN_ACL_RULES;
use crate::constants::DEFAULT_USER;
use crate::constants::MAINTENANCE_ACL_RULES;
use crate::engine::Connector;
use crate::engine::EngineAdmin;
use crate::engine::EngineLauncher;
use crate::engine::ProcessLauncher;
use crate::engine::RedisEngineAdmin;
use crate::formation::CliClusterOps;
use crate::formation::ClusterFormationCoordinator;
use crate::formation::ClusterOps;
use crate::formation::FormationPolicies;
use crate::materializer::engine_directives;
use crate::materializer::monitor_directives;
use crate::materializer::template_params;
use crate::materializer::ConfigMaterializer;
use crate::monitor::MonitorRegistration;
use crate::monitor::QuorumMonitor;
use crate::monitor::RedisQuorumMonitor;
use crate::peer::DnsLookup;
use crate::peer::LivenessProbe;
use crate::peer::NameLookup;
use crate::reconcile::RecordedSelf;
use crate::reconcile::TopologyDriftReconciler;
use crate::role::DiscoveryPolicies;
use crate::role::PeerRoleProbe;
use crate::role::RoleDecider;
use crate::topology::FormationMarker;
use crate::utils::async_task::retry_until;
use crate::utils::async_task::spawn_task;
use crate::utils::net::parse_ip_literal;
use crate::CoordinatorConfig;
use crate::Error;
use crate::NetworkError;
use crate::NodeIdentity;
use crate::PeerResolver;
use crate::PeerSet;
use crate::ProcessError;
use crate::Result;
use crate::Role;
use crate::RoleDecision;
use crate::TopologyMode;

/// External collaborators of the controller. Production wiring comes from
/// [`Dependencies::from_config`]; tests substitute mocks.
#[derive(Clone)]
pub struct Dependencies {
    pub lookup: Arc<dyn NameLookup>,
    pub probe: Arc<dyn LivenessProbe>,
    pub peer_roles: Arc<dyn PeerRoleProbe>,
    pub monitor: Option<Arc<dyn QuorumMonitor>>,
    pub admin: Arc<dyn EngineAdmin>,
    pub cluster_ops: Arc<dyn ClusterOps>,
    pub launcher: Arc<dyn EngineLauncher>,
}

impl Dependencies {
    pub fn from_config(config: &CoordinatorConfig) -> Result<Self> {
        let connector = Connector::from_config(config)?;
        // Certificate checks need the announced name; plain connections stay local.
        let admin_host = if config.tls.enable_tls {
            config.node.announce_host().to_string()
        } else {
            "127.0.0.1".to_string()
        };
        let monitor = config.monitor.is_active(config.node.topology).then(|| {
            Arc::new(RedisQuorumMonitor::new(
                connector.clone(),
                config.monitor.host.clone(),
                config.monitor.port,
            )) as Arc<dyn QuorumMonitor>
        });

        Ok(Self {
            lookup: Arc::new(DnsLookup::new(connector.timeout())),
            probe: Arc::new(connector.clone()),
            peer_roles: Arc::new(connector.clone()),
            monitor,
            admin: Arc::new(RedisEngineAdmin::new(connector.clone(), admin_host, config.node.port)),
            cluster_ops: Arc::new(CliClusterOps::from_config(config, connector)),
            launcher: Arc::new(ProcessLauncher),
        })
    }
}

/// Walks the node through `Starting -> ConfiguringEngine -> EngineRunning ->
/// RegisteringWithMonitor -> [Formation] -> Ready -> Draining -> Stopped`.
///
/// Control flow is sequential. A shutdown signal that arrives while a boot
/// step is blocked is acted on once that step returns.
pub struct LifecycleController {
    config: Arc<CoordinatorConfig>,
    deps: Dependencies,
    status: Arc<NodeStatus>,
    resolver: PeerResolver,
    peers: PeerSet,
    total_memory: fn() -> u64,
}

impl LifecycleController {
    pub fn new(
        config: Arc<CoordinatorConfig>,
        deps: Dependencies,
        status: Arc<NodeStatus>,
    ) -> Self {
        let resolver = PeerResolver::new(
            deps.lookup.clone(),
            deps.probe.clone(),
            Duration::from_millis(config.peers.settle_delay_ms),
        );
        let peers = PeerSet::from_config(&config.peers, config.node.port);
        Self {
            config,
            deps,
            status,
            resolver,
            peers,
            total_memory: system_total_memory,
        }
    }

    /// Overrides the host memory probe used for the fallback ceiling.
    pub fn with_total_memory(
        mut self,
        total_memory: fn() -> u64,
    ) -> Self {
        self.total_memory = total_memory;
        self
    }

    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        let mut supervisor = Supervisor::new(self.deps.launcher.clone());
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        let boot_role = self.boot(&mut supervisor, &shutdown, &mut tasks).await?;
        self.status.set_phase(LifecyclePhase::Ready);

        tokio::select! {
            _ = shutdown.changed() => info!("shutdown requested"),
            (kind, status) = supervisor.exited() => {
                let status = status.unwrap_or_else(|e| e.to_string());
                supervisor.stop_all(self.stop_grace()).await;
                return Err(ProcessError::UnexpectedExit {
                    name: kind.name().to_string(),
                    status,
                }
                .into());
            }
        }

        self.status.set_phase(LifecyclePhase::Draining);
        let role = self.current_role(boot_role).await;
        self.drainer().drain(role, &mut supervisor).await?;
        for task in tasks {
            task.abort();
        }
        self.status.set_phase(LifecyclePhase::Stopped);
        Ok(())
    }

    /// Everything up to readiness. Returns the role decided at boot.
    async fn boot(
        &self,
        supervisor: &mut Supervisor,
        shutdown: &watch::Receiver<()>,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Result<Role> {
        self.status.set_phase(LifecyclePhase::Starting);
        let me = self.identify().await?;
        let decision = self.decide_role(&me).await?;
        if let Some(decision) = &decision {
            self.status.set_decision(decision.clone());
        }

        self.status.set_phase(LifecyclePhase::ConfiguringEngine);
        let recorded = self.configure(&me, decision.as_ref()).await?;

        self.status.set_phase(LifecyclePhase::EngineRunning);
        self.launch(supervisor).await?;

        self.status.set_phase(LifecyclePhase::RegisteringWithMonitor);
        self.register(&me, decision.as_ref()).await?;
        self.apply_persistence().await?;

        if self.config.node.topology == TopologyMode::Sharded {
            self.status.set_phase(LifecyclePhase::Formation);
            self.form(&me, recorded, shutdown, tasks).await?;
        }
        self.spawn_maintenance(shutdown, tasks);

        Ok(decision.map(|d| d.role).unwrap_or_default())
    }

    fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.config.node.engine_stop_timeout_ms)
    }

    /// This node's current address, looked up under the peer resolution
    /// policy.
    #[instrument(skip(self))]
    async fn identify(&self) -> Result<NodeIdentity> {
        let node = &self.config.node;
        let address = match parse_ip_literal(&node.name) {
            Some(ip) => ip,
            None => {
                let name = node.name.as_str();
                let resolver = &self.resolver;
                retry_until("self address", &self.config.retry.peer_resolution, |_| async move {
                    let addrs = resolver.addresses(name).await?;
                    addrs.first().copied().ok_or_else(|| {
                        Error::from(NetworkError::ResolveFailed {
                            host: name.to_string(),
                            reason: "no addresses".into(),
                        })
                    })
                })
                .await
                .map_err(|e| NetworkError::PeerUnreachable {
                    peer: name.to_string(),
                    elapsed: e.elapsed,
                })?
            }
        };
        info!("node {} is at {address}", node.name);
        Ok(NodeIdentity {
            name: node.name.clone(),
            address,
            port: node.port,
            bus_port: node.bus_port(),
        })
    }

    /// `None` in sharded mode, where the topology assigns roles.
    async fn decide_role(
        &self,
        me: &NodeIdentity,
    ) -> Result<Option<RoleDecision>> {
        let decision = match self.config.node.topology {
            TopologyMode::Standalone => RoleDecision::primary(me.endpoint()),
            TopologyMode::Sharded => return Ok(None),
            TopologyMode::Replicated => {
                let decider = RoleDecider::new(
                    self.resolver.clone(),
                    self.deps.monitor.clone(),
                    self.deps.peer_roles.clone(),
                    self.config.monitor.group_name.clone(),
                    self.peers.clone(),
                    self.config.cluster.creator_index,
                    DiscoveryPolicies {
                        primary_discovery: self.config.retry.primary_discovery,
                        bootstrap_discovery: self.config.retry.bootstrap_discovery,
                    },
                );
                decider.decide(me, self.config.node_index()).await?
            }
        };

        if let Some(upstream) = decision.upstream() {
            self.resolver
                .resolve(&upstream.host, upstream.port, &self.config.retry.peer_resolution)
                .await?;
        }
        info!("role decided: {}", decision.role);
        Ok(Some(decision))
    }

    fn reconciler(&self) -> TopologyDriftReconciler {
        TopologyDriftReconciler::new(
            self.resolver.clone(),
            self.config.node.data_dir.join(&self.config.cluster.record_file),
            self.config.retry.peer_reintroduction,
        )
    }

    /// Writes the engine (and co-located monitor) configuration. In sharded
    /// mode the topology record is corrected first, while the engine is down.
    async fn configure(
        &self,
        me: &NodeIdentity,
        decision: Option<&RoleDecision>,
    ) -> Result<Option<RecordedSelf>> {
        let config = &self.config;
        let recorded = if config.node.topology == TopologyMode::Sharded {
            self.reconciler().reconcile_record(me).await?
        } else {
            None
        };

        let params = template_params(config);
        ConfigMaterializer::new(config.node.engine_config_path(), config.node.config_template.clone())
            .apply(decision, &params, &engine_directives(config))
            .await?;

        if self.runs_local_monitor() {
            ConfigMaterializer::new(config.node.data_dir.join(&config.monitor.config_file), None)
                .apply(None, &params, &monitor_directives(config))
                .await?;
        }
        Ok(recorded)
    }

    fn runs_local_monitor(&self) -> bool {
        self.config.monitor.run_local && self.config.monitor.is_active(self.config.node.topology)
    }

    async fn launch(
        &self,
        supervisor: &mut Supervisor,
    ) -> Result<()> {
        supervisor.start(engine_launch_spec(&self.config)).await?;
        if self.runs_local_monitor() {
            supervisor.start(monitor_launch_spec(&self.config)).await?;
        }

        let admin = self.deps.admin.as_ref();
        retry_until("engine ready", &self.config.retry.engine_ready, |_| admin.ping()).await?;
        info!("engine accepts connections");
        Ok(())
    }

    /// Access rules, then monitor registration for a primary.
    async fn register(
        &self,
        me: &NodeIdentity,
        decision: Option<&RoleDecision>,
    ) -> Result<()> {
        let warmup = Duration::from_millis(self.config.node.engine_warmup_ms);
        if !warmup.is_zero() {
            debug!("letting the engine settle for {warmup:?}");
            sleep(warmup).await;
        }

        let credentials = &self.config.credentials;
        self.deps
            .admin
            .set_acl_user(DEFAULT_USER, &credentials.admin_password, rules(ADMIN_ACL_RULES))
            .await?;
        self.deps
            .admin
            .set_acl_user(
                &credentials.maintenance_user,
                &credentials.maintenance_password,
                rules(MAINTENANCE_ACL_RULES),
            )
            .await?;

        if let (Some(monitor), Some(decision)) = (self.deps.monitor.as_deref(), decision) {
            if decision.role == Role::Primary {
                MonitorRegistration::from_config(&self.config, me.endpoint())
                    .apply(monitor)
                    .await?;
            }
        }
        Ok(())
    }

    /// Memory ceiling, snapshot cadence and fsync policy, persisted to the
    /// engine's own configuration file.
    async fn apply_persistence(&self) -> Result<()> {
        for (key, value) in persistence_settings(&self.config.persistence, self.total_memory) {
            self.deps.admin.config_set(key, &value).await?;
        }
        self.deps.admin.config_rewrite().await?;
        Ok(())
    }

    async fn form(
        &self,
        me: &NodeIdentity,
        recorded: Option<RecordedSelf>,
        shutdown: &watch::Receiver<()>,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Result<()> {
        let config = &self.config;
        let marker = FormationMarker::new(config.node.data_dir.join(&config.cluster.marker_file));
        let outcome = ClusterFormationCoordinator::new(
            self.deps.cluster_ops.clone(),
            self.resolver.clone(),
            marker,
            self.peers.clone(),
            me.clone(),
            config.node_index(),
            config.cluster.clone(),
            FormationPolicies::from(&config.retry),
        )
        .run()
        .await?;
        info!("topology formed: {outcome:?}");

        let upstream = recorded.and_then(|r| r.upstream);
        let report = self
            .reconciler()
            .reconcile_live(self.deps.admin.as_ref(), upstream.as_deref())
            .await?;
        debug!("drift reconciliation: {report:?}");

        // One delayed re-scan catches peers that came back after this boot.
        let reconciler = self.reconciler();
        let admin = self.deps.admin.clone();
        let delay = Duration::from_millis(config.cluster.drift_rescan_delay_ms);
        let mut shutdown = shutdown.clone();
        spawn_task(
            "drift rescan",
            move || async move {
                tokio::select! {
                    _ = shutdown.changed() => Ok(()),
                    _ = sleep(delay) => reconciler
                        .reconcile_live(admin.as_ref(), upstream.as_deref())
                        .await
                        .map(|report| debug!("drift re-scan: {report:?}")),
                }
            },
            Some(tasks),
        );
        Ok(())
    }

    fn spawn_maintenance(
        &self,
        shutdown: &watch::Receiver<()>,
        tasks: &mut Vec<JoinHandle<()>>,
    ) {
        let maintenance = &self.config.maintenance;
        let admin = self.deps.admin.clone();
        let threshold = maintenance.aof_rewrite_threshold_bytes;
        let period = Duration::from_secs(maintenance.aof_check_interval_secs);
        let rx = shutdown.clone();
        spawn_task(
            "aof maintenance",
            move || aof_maintenance(admin, threshold, period, rx),
            Some(&mut *tasks),
        );

        if self.config.tls.enable_tls {
            let admin = self.deps.admin.clone();
            let cert = self.config.tls.cert_path.clone();
            let key = self.config.tls.key_path.clone();
            let period = Duration::from_secs(maintenance.cert_check_interval_secs);
            let rx = shutdown.clone();
            spawn_task(
                "certificate reload",
                move || async move {
                    let watcher = CertificateWatcher::new(cert, key).await;
                    certificate_maintenance(admin, watcher, period, rx).await
                },
                Some(tasks),
            );
        }
    }

    /// The role may have moved since boot; ask the engine, fall back to the
    /// boot decision.
    async fn current_role(
        &self,
        boot_role: Role,
    ) -> Role {
        if self.config.node.topology != TopologyMode::Replicated {
            return boot_role;
        }
        match self.deps.admin.info("replication").await {
            Ok(report) if report.is_primary() => Role::Primary,
            Ok(_) => Role::Replica,
            Err(e) => {
                warn!("engine role unknown at shutdown, assuming {boot_role}: {e}");
                boot_role
            }
        }
    }

    fn drainer(&self) -> Drainer {
        Drainer::new(
            self.deps.admin.clone(),
            self.deps.monitor.clone(),
            self.config.monitor.group_name.clone(),
            self.config.retry.failover_wait,
            self.config.retry.checkpoint_wait,
            self.stop_grace(),
        )
    }
}

fn rules(list: &[&str]) -> Vec<String> {
    list.iter().map(|r| r.to_string()).collect()
}

