//! Per-tick progress arithmetic.

/// Apply one tick's increment, clamped to `target`.
pub fn advance(progress: u32, increment: u32, target: u32) -> u32 {
    progress.saturating_add(increment).min(target)
}

/// Loop condition of a runner: keep going until the target is reached or
/// someone else has ended the race.
pub fn should_continue(progress: u32, target: u32, race_ended: bool) -> bool {
    progress < target && !race_ended
}

/// Upper bound on the ticks any runner needs to reach `target`.
pub fn worst_case_ticks(target: u32, min_increment: u32) -> u64 {
    u64::from(target).div_ceil(u64::from(min_increment.max(1)))
}
