//! I/O helpers for race commands.

pub mod config;
