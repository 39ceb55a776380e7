//! Deterministic, pure logic shared by the race simulator.
//!
//! Core modules must be free of I/O and async. The only shared mutable state
//! lives in [`claim::RaceState`], which is plain atomics.

pub mod claim;
pub mod invariants;
pub mod progress;
pub mod types;
