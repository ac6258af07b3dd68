//! Peer naming, resolution and liveness.

mod endpoint;
mod resolver;

pub use endpoint::*;
pub use resolver::*;
