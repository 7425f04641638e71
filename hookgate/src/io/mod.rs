//! I/O helpers: config, the workflow state store and command execution.

pub mod commands;
pub mod config;
pub mod process;
pub mod store;
