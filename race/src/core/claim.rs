//! Shared race state and the atomic victory claim.
//!
//! Every runner task holds the same [`RaceState`]. The race-ended flag moves
//! from `false` to `true` exactly once. The winner slot packs `(tick, runner)`
//! into one `u64` and keeps the minimum, so a runner that reached the target
//! in fewer ticks wins, and equal ticks go to the lowest runner index, no
//! matter which task the scheduler happened to poll first.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::core::types::RunnerId;

const RUNNER_BITS: u32 = 8;
const RUNNER_MASK: u64 = (1 << RUNNER_BITS) - 1;
const MAX_TICK: u64 = (u64::MAX >> RUNNER_BITS) - 1;
const NO_WINNER: u64 = u64::MAX;

/// Result of a runner's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Claim {
    /// True only for the claim that flipped `race_ended`.
    pub ended_race: bool,
}

/// Race-wide flag plus the winner slot.
#[derive(Debug)]
pub struct RaceState {
    race_ended: AtomicBool,
    winner: AtomicU64,
}

impl Default for RaceState {
    fn default() -> Self {
        Self::new()
    }
}

impl RaceState {
    pub fn new() -> Self {
        Self {
            race_ended: AtomicBool::new(false),
            winner: AtomicU64::new(NO_WINNER),
        }
    }

    /// Loop-continuation read. May lag a concurrent `end` by one tick.
    pub fn is_ended(&self) -> bool {
        self.race_ended.load(Ordering::Acquire)
    }

    /// Flip `race_ended` to true. Returns true for the single caller that
    /// performed the transition.
    pub fn end(&self) -> bool {
        self.race_ended
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record that `runner` reached the target on `tick`, then end the race.
    ///
    /// The winner slot is written before the flag so anyone who observes the
    /// race as ended also observes at least one claim.
    pub fn claim(&self, runner: RunnerId, tick: u64) -> Claim {
        self.winner.fetch_min(pack(runner, tick), Ordering::AcqRel);
        Claim {
            ended_race: self.end(),
        }
    }

    /// Best claim so far as `(runner, tick)`.
    pub fn winner(&self) -> Option<(RunnerId, u64)> {
        let slot = self.winner.load(Ordering::Acquire);
        (slot != NO_WINNER).then(|| unpack(slot))
    }
}

fn pack(runner: RunnerId, tick: u64) -> u64 {
    debug_assert!((runner.index() as u64) <= RUNNER_MASK);
    (tick.min(MAX_TICK) << RUNNER_BITS) | (runner.index() as u64 & RUNNER_MASK)
}

fn unpack(slot: u64) -> (RunnerId, u64) {
    (
        RunnerId((slot & RUNNER_MASK) as usize),
        slot >> RUNNER_BITS,
    )
}
