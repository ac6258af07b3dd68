//! Quorum monitor (sentinel) client and group registration.

mod client;
mod registration;

pub use client::*;
pub use registration::*;

#[cfg(test)]
mod client_test;
