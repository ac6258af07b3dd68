use std::fmt;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::ClusterOps;
use crate::metrics::FORMATION_ACTIONS;
use crate::topology::FormationMarker;
use crate::utils::async_task::retry_until;
use crate::ClusterConfig;
use crate::Endpoint;
use crate::Error;
use crate::FormationError;
use crate::NodeIdentity;
use crate::PeerResolver;
use crate::PeerSet;
use crate::Result;
use crate::RetryPolicies;
use crate::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormationState {
    Unformed,
    ProbingPeers,
    Creating,
    /// Joining through a member of the formed topology
    Joining(Endpoint),
    WaitingForCreator,
    Formed(FormationOutcome),
}

impl fmt::Display for FormationState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            FormationState::Unformed => write!(f, "unformed"),
            FormationState::ProbingPeers => write!(f, "probing-peers"),
            FormationState::Creating => write!(f, "creating"),
            FormationState::Joining(via) => write!(f, "joining via {via}"),
            FormationState::WaitingForCreator => write!(f, "waiting-for-creator"),
            FormationState::Formed(outcome) => write!(f, "formed ({outcome:?})"),
        }
    }
}

/// How this boot reached `Formed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormationOutcome {
    /// Marker present or the engine already knows other members
    AlreadyMember,
    Created,
    Joined { via: Endpoint },
}

#[derive(Debug, Clone)]
pub struct FormationPolicies {
    pub peer_resolution: RetryPolicy,
    pub creator_wait: RetryPolicy,
    pub cluster_join: RetryPolicy,
}

impl From<&RetryPolicies> for FormationPolicies {
    fn from(policies: &RetryPolicies) -> Self {
        Self {
            peer_resolution: policies.peer_resolution,
            creator_wait: policies.creator_wait,
            cluster_join: policies.cluster_join,
        }
    }
}

/// Drives a sharded node from an empty engine to a member of the topology.
///
/// Creation is pinned to `creator_index`: that node must exist when the
/// topology is first formed, and should be the last one scaled down. Every
/// other node only ever joins.
pub struct ClusterFormationCoordinator {
    ops: Arc<dyn ClusterOps>,
    resolver: PeerResolver,
    marker: FormationMarker,
    peers: PeerSet,
    me: NodeIdentity,
    index: u32,
    cluster: ClusterConfig,
    policies: FormationPolicies,
}

impl ClusterFormationCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ops: Arc<dyn ClusterOps>,
        resolver: PeerResolver,
        marker: FormationMarker,
        peers: PeerSet,
        me: NodeIdentity,
        index: u32,
        cluster: ClusterConfig,
        policies: FormationPolicies,
    ) -> Self {
        Self {
            ops,
            resolver,
            marker,
            peers,
            me,
            index,
            cluster,
            policies,
        }
    }

    fn is_creator(&self) -> bool {
        self.index == self.cluster.creator_index
    }

    /// Runs the state machine to `Formed`. Create and join happen at most
    /// once per data volume: the marker short-circuits every later boot.
    #[instrument(skip(self), fields(index = self.index))]
    pub async fn run(&self) -> Result<FormationOutcome> {
        let mut state = FormationState::Unformed;
        loop {
            let next = match &state {
                FormationState::Unformed => self.check_membership().await,
                FormationState::ProbingPeers => self.probe_peers().await,
                FormationState::WaitingForCreator => self.wait_for_creator().await?,
                FormationState::Creating => self.create().await?,
                FormationState::Joining(via) => self.join(via).await?,
                FormationState::Formed(outcome) => return Ok(outcome.clone()),
            };
            debug!("formation: {state} -> {next}");
            state = next;
        }
    }

    async fn check_membership(&self) -> FormationState {
        if self.marker.is_set().await {
            info!("formation marker present, skipping create and join");
            return FormationState::Formed(FormationOutcome::AlreadyMember);
        }

        let me = self.me.endpoint();
        match self.ops.known_members(&me.host, me.port).await {
            Ok(known) if known > 1 => {
                info!("engine already knows {known} members, treating as formed");
                if let Err(e) = self.marker.set("member").await {
                    warn!("could not persist formation marker: {e}");
                }
                FORMATION_ACTIONS.with_label_values(&["already_member"]).inc();
                FormationState::Formed(FormationOutcome::AlreadyMember)
            }
            Ok(_) => FormationState::ProbingPeers,
            Err(e) => {
                warn!("own membership unknown: {e}");
                FormationState::ProbingPeers
            }
        }
    }

    /// Peers asked for a formed topology: all of them for the creator, the
    /// first `probe_witnesses` otherwise.
    fn witnesses(&self) -> Vec<&Endpoint> {
        let limit = if self.is_creator() {
            usize::MAX
        } else {
            self.cluster.probe_witnesses as usize
        };
        self.peers.others(self.index).map(|(_, peer)| peer).take(limit).collect()
    }

    async fn find_formed_peer(&self) -> Option<Endpoint> {
        for peer in self.witnesses() {
            match self.ops.topology_formed(&peer.host, peer.port).await {
                Ok(true) => return Some(peer.clone()),
                Ok(false) => debug!("{peer} has no formed topology"),
                Err(e) => debug!("{peer} not probeable: {e}"),
            }
        }
        None
    }

    async fn probe_peers(&self) -> FormationState {
        match self.find_formed_peer().await {
            Some(peer) => FormationState::Joining(peer),
            None if self.is_creator() => FormationState::Creating,
            None => FormationState::WaitingForCreator,
        }
    }

    async fn wait_for_creator(&self) -> Result<FormationState> {
        let probed = self.witnesses().len();
        let peer = retry_until("creator wait", &self.policies.creator_wait, |_| async move {
            self.find_formed_peer()
                .await
                .ok_or_else(|| Error::from(FormationError::NoFormedPeer { probed }))
        })
        .await
        .map_err(|e| FormationError::CreatorMissing { waited: e.elapsed })?;
        Ok(FormationState::Joining(peer))
    }

    /// Every member must be live; the create itself is never retried.
    async fn create(&self) -> Result<FormationState> {
        let mut members = Vec::with_capacity(self.peers.len());
        let mut missing = Vec::new();
        for (i, peer) in (0u32..).zip(self.peers.members()) {
            if i == self.index {
                members.push(Endpoint::new(self.me.address.to_string(), self.me.port));
                continue;
            }
            match self
                .resolver
                .resolve(&peer.host, peer.port, &self.policies.peer_resolution)
                .await
            {
                Ok(resolved) => match resolved.primary_addr() {
                    Some(ip) => members.push(Endpoint::new(ip.to_string(), peer.port)),
                    None => missing.push(peer.to_string()),
                },
                Err(e) => {
                    warn!("{peer} not reachable for creation: {e}");
                    missing.push(peer.to_string());
                }
            }
        }
        if !missing.is_empty() {
            return Err(FormationError::PeersNotReachable { missing }.into());
        }

        info!("creating topology from {} members", members.len());
        self.ops
            .create(members, self.cluster.replicas)
            .await
            .map_err(|e| FormationError::CreateFailed(e.to_string()))?;
        FORMATION_ACTIONS.with_label_values(&["create"]).inc();
        self.marker.set("created").await?;
        Ok(FormationState::Formed(FormationOutcome::Created))
    }

    async fn knows_other_members(
        &self,
        own: &Endpoint,
    ) -> bool {
        match self.ops.known_members(&own.host, own.port).await {
            Ok(known) => known > 1,
            Err(e) => {
                debug!("own membership unknown: {e}");
                false
            }
        }
    }

    async fn join(
        &self,
        via: &Endpoint,
    ) -> Result<FormationState> {
        let resolved = self
            .resolver
            .resolve(&via.host, via.port, &self.policies.peer_resolution)
            .await?;
        let existing = match resolved.primary_addr() {
            Some(ip) => Endpoint::new(ip.to_string(), via.port),
            None => via.clone(),
        };
        let me = Endpoint::new(self.me.address.to_string(), self.me.port);
        let as_replica = self.cluster.joins_as_replica(self.index);

        let own = self.me.endpoint();
        retry_until("cluster join", &self.policies.cluster_join, |attempt| {
            let me = me.clone();
            let existing = existing.clone();
            let own = &own;
            async move {
                // A failed attempt may still have landed on the engine.
                if attempt > 1 && self.knows_other_members(own).await {
                    info!("engine already lists other members, join took effect");
                    return Ok(());
                }
                self.ops.add_member(me, existing, as_replica).await
            }
        })
        .await
        .map_err(|e| FormationError::JoinFailed {
            via: via.to_string(),
            attempts: e.attempts,
            reason: e.last_error.to_string(),
        })?;

        FORMATION_ACTIONS.with_label_values(&["join"]).inc();
        self.marker.set("joined").await?;
        Ok(FormationState::Formed(FormationOutcome::Joined { via: via.clone() }))
    }
}
