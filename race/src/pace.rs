//! Sources of per-tick progress increments.
//!
//! The simulator asks a [`PaceFactory`] for one [`IncrementSource`] per runner
//! at race start. Production races use [`RandomPace`]; deterministic scenarios
//! use [`FixedPace`].

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::types::RunnerId;
use crate::io::config::RaceConfig;

/// Produces the increment applied on each tick of one runner.
pub trait IncrementSource: Send + 'static {
    fn next_increment(&mut self) -> u32;
}

/// Builds the increment sources for a race.
pub trait PaceFactory: Send + Sync {
    fn source_for(&self, runner: RunnerId) -> Box<dyn IncrementSource>;
}

/// Uniformly random increments in an inclusive range.
#[derive(Debug)]
pub struct RandomIncrements {
    rng: StdRng,
    range: RangeInclusive<u32>,
}

impl RandomIncrements {
    pub fn new(range: RangeInclusive<u32>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, range }
    }
}

impl IncrementSource for RandomIncrements {
    fn next_increment(&mut self) -> u32 {
        self.rng.gen_range(self.range.clone())
    }
}

/// The same increment on every tick.
#[derive(Debug, Clone, Copy)]
pub struct FixedIncrement(pub u32);

impl IncrementSource for FixedIncrement {
    fn next_increment(&mut self) -> u32 {
        self.0
    }
}

/// Random increments configured from [`RaceConfig`].
///
/// With a seed, runner `i` draws from `seed ^ i`, so every race started from
/// the same config replays identically.
#[derive(Debug, Clone)]
pub struct RandomPace {
    range: RangeInclusive<u32>,
    seed: Option<u64>,
}

impl RandomPace {
    pub fn new(range: RangeInclusive<u32>, seed: Option<u64>) -> Self {
        Self { range, seed }
    }

    pub fn from_config(cfg: &RaceConfig) -> Self {
        Self::new(cfg.increment_min..=cfg.increment_max, cfg.seed)
    }
}

impl PaceFactory for RandomPace {
    fn source_for(&self, runner: RunnerId) -> Box<dyn IncrementSource> {
        let seed = self.seed.map(|seed| seed ^ runner.index() as u64);
        Box::new(RandomIncrements::new(self.range.clone(), seed))
    }
}

/// Fixed increments per runner, in index order.
#[derive(Debug, Clone)]
pub struct FixedPace {
    increments: Vec<u32>,
}

impl FixedPace {
    /// Runners past the end of `increments` reuse the last entry.
    pub fn new(increments: Vec<u32>) -> Self {
        Self { increments }
    }

    pub fn uniform(increment: u32) -> Self {
        Self::new(vec![increment])
    }
}

impl PaceFactory for FixedPace {
    fn source_for(&self, runner: RunnerId) -> Box<dyn IncrementSource> {
        let increment = self
            .increments
            .get(runner.index())
            .or_else(|| self.increments.last())
            .copied()
            .unwrap_or(1);
        Box::new(FixedIncrement(increment))
    }
}
