//! I/O helpers for calcheck commands.

pub mod config;
pub mod snapshot_store;
pub mod summary;
