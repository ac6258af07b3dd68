pub mod async_task;
pub mod file_io;
pub mod net;

#[cfg(test)]
mod net_test;
