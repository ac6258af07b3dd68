//! Node lifecycle: boot sequence, supervision of the engine, background
//! maintenance and the ordered drain on shutdown.

mod controller;
mod drain;
mod maintenance;
mod memory;
mod status;
mod supervisor;

pub use controller::*;
pub use drain::*;
pub use maintenance::*;
pub use memory::*;
pub use status::*;
pub use supervisor::*;

#[cfg(test)]
mod controller_test;
