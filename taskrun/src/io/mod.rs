//! I/O adapters for task storage, configuration and command execution.

pub mod config;
pub mod process;
pub mod store;
