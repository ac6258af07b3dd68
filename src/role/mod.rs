//! Primary/replica decision at boot.

mod decider;

pub use decider::*;

#[cfg(test)]
mod decider_test;
