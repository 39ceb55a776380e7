//! Three-runner concurrent progress race.
//!
//! Three runners advance toward a target by a random increment every tick.
//! The first to arrive wins, and a shared race-ended flag stops the rest. The
//! crate is split the same way across all commands:
//!
//! - **[`core`]**: Pure logic (claim arbitration, progress stepping,
//!   invariants). No I/O, no async, fully testable in isolation.
//! - **[`io`]**: Side-effecting configuration loading and writing.
//!
//! [`simulator`] runs races on tokio tasks, [`pace`] supplies the per-tick
//! increments, and [`render`] draws the board for the CLI host.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pace;
pub mod render;
pub mod simulator;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
