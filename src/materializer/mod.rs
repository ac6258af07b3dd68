//! Engine and monitor configuration files.

mod document;
#[allow(clippy::module_inception)]
mod materializer;

pub use document::*;
pub use materializer::*;
