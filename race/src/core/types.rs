//! Shared deterministic types for the race core.
//!
//! These types define stable contracts between the simulator, its hosts and
//! the tests. They hold no synchronization state and serialize to the JSON
//! emitted by `race run --json`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of runners in every race.
pub const RUNNER_COUNT: usize = 3;

/// Index of a runner within its race. Lower indexes win ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunnerId(pub usize);

impl RunnerId {
    pub fn index(self) -> usize {
        self.0
    }

    /// All runner ids of a race, in index order.
    pub fn all() -> impl Iterator<Item = RunnerId> {
        (0..RUNNER_COUNT).map(RunnerId)
    }
}

impl fmt::Display for RunnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runner-{}", self.0)
    }
}

/// Lifecycle of a single runner.
///
/// `Idle -> Running -> {FinishedWinner | FinishedLoserStopped}`. A runner only
/// returns to `Idle` through an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerPhase {
    Idle,
    Running,
    FinishedWinner,
    FinishedLoserStopped,
}

impl RunnerPhase {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            RunnerPhase::FinishedWinner | RunnerPhase::FinishedLoserStopped
        )
    }
}

/// Lifecycle of a whole race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    Idle,
    Running,
    Finished,
    Cancelled,
}

/// Point-in-time view of one runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSnapshot {
    pub id: RunnerId,
    pub name: String,
    pub progress: u32,
    /// Ticks this runner has consumed so far.
    pub ticks: u64,
    pub phase: RunnerPhase,
}

/// Point-in-time view of the race board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    /// `None` until the first race starts, and again after a reset.
    pub race_id: Option<u64>,
    pub status: RaceStatus,
    pub target: u32,
    pub runners: Vec<RunnerSnapshot>,
    /// Winner name, only set once the race is `Finished`.
    pub winner: Option<String>,
}

/// Result of a race that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceOutcome {
    pub race_id: u64,
    pub winner: RunnerId,
    pub winner_name: String,
    /// Tick at which the winner reached the target.
    pub winning_tick: u64,
    /// Final progress of every runner, in index order.
    pub final_progress: Vec<u32>,
}

/// Events published to hosts while a race runs.
///
/// `Winner` is the one-shot notification: it is sent at most once per race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceEvent {
    Started {
        race_id: u64,
        runners: Vec<String>,
    },
    Progress {
        race_id: u64,
        runner: RunnerId,
        progress: u32,
        tick: u64,
    },
    Winner {
        race_id: u64,
        runner: RunnerId,
        name: String,
        tick: u64,
    },
    Cancelled {
        race_id: u64,
    },
}

impl RaceEvent {
    pub fn race_id(&self) -> u64 {
        match self {
            RaceEvent::Started { race_id, .. }
            | RaceEvent::Progress { race_id, .. }
            | RaceEvent::Winner { race_id, .. }
            | RaceEvent::Cancelled { race_id } => *race_id,
        }
    }

    /// True for the events after which a race publishes nothing more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RaceEvent::Winner { .. } | RaceEvent::Cancelled { .. })
    }
}
