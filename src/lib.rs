//! Lifecycle coordinator for FalkorDB graph engine nodes.
//!
//! Brings one engine node up in a standalone, replicated (primary/replica
//! with a quorum monitor) or sharded topology, keeps it consistent with its
//! peers across restarts and address changes, and drains it on shutdown.

mod config;
pub mod constants;
pub mod engine;
mod errors;
pub mod formation;
pub mod health;
pub mod lifecycle;
pub mod materializer;
pub mod metrics;
pub mod monitor;
pub mod peer;
pub mod reconcile;
pub mod role;
pub mod topology;
pub mod utils;

pub use config::*;
pub use errors::*;
pub use lifecycle::Dependencies;
pub use lifecycle::LifecycleController;
pub use lifecycle::LifecyclePhase;
pub use lifecycle::NodeStatus;
pub use peer::Endpoint;
pub use peer::NodeIdentity;
pub use peer::PeerResolver;
pub use peer::PeerSet;
pub use role::Role;
pub use role::RoleDecision;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
