//! Sharded topology formation: create once, join otherwise.

mod coordinator;
mod ops;

pub use coordinator::*;
pub use ops::*;

#[cfg(test)]
mod coordinator_test;
