//! Shared fixtures for unit tests: configurations rooted in temp
//! directories, peer name tables and fake child processes.
mod common;
mod mock;

pub use common::*;
pub use mock::*;
