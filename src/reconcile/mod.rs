//! Topology drift: repairs the member table after addresses changed across a
//! restart.

mod drift;

pub use drift::*;

#[cfg(test)]
mod drift_test;
