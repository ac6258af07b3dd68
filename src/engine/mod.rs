//! Engine-facing plumbing: connections, administrative commands, `INFO`
//! parsing and child process supervision.

mod admin;
mod connector;
mod info;
mod process;

pub use admin::*;
pub use connector::*;
pub use info::*;
pub use process::*;
