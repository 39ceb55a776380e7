//! Stable exit codes for race CLI commands.

/// Command succeeded; for `race run`, a winner was announced.
pub const OK: i32 = 0;
/// Command failed due to invalid config, a broken race invariant, or other errors.
pub const INVALID: i32 = 1;
/// `race run` was interrupted and the race cancelled before a winner.
pub const CANCELLED: i32 = 2;
