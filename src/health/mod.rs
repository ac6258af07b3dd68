//! Startup, readiness and liveness endpoints for the orchestrator, plus the
//! metrics exposition.
mod server;

pub use server::*;
