//! Durable topology state on the data volume: the member record and the
//! formation marker.

mod marker;
mod record;

pub use marker::*;
pub use record::*;

#[cfg(test)]
mod record_test;
