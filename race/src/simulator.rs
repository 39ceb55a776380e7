//! Orchestration of a race: one tokio task per runner plus a supervisor.
//!
//! Runner tasks share a [`Board`] holding their progress and the
//! [`RaceState`]. Each runner suspends only on its tick, advances, publishes
//! progress, and claims victory once it reaches the target. The supervisor
//! joins every runner, resolves the winner from the claim slot, and sends the
//! single [`RaceEvent::Winner`] notification.
//!
//! A reset aborts the runners and waits for the supervisor, which only returns
//! after every runner task is gone. The next race gets a fresh board, so no
//! stale task can ever touch it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::claim::RaceState;
use crate::core::progress::{advance, should_continue};
use crate::core::types::{
    RUNNER_COUNT, RaceEvent, RaceOutcome, RaceSnapshot, RaceStatus, RunnerId, RunnerPhase,
    RunnerSnapshot,
};
use crate::io::config::RaceConfig;
use crate::pace::{IncrementSource, PaceFactory, RandomPace};

/// A race was cancelled before a winner was decided, by a reset, a restart
/// or an interrupt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceCancelledError {
    pub race_id: u64,
}

impl fmt::Display for RaceCancelledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "race {} was cancelled before a winner was decided", self.race_id)
    }
}

impl std::error::Error for RaceCancelledError {}

/// What a runner task reports when it stops.
#[derive(Debug, Clone, Copy)]
struct RunnerExit {
    runner: RunnerId,
    progress: u32,
    ticks: u64,
}

#[derive(Debug)]
struct Lane {
    progress: AtomicU32,
    ticks: AtomicU64,
    phase: AtomicU8,
}

impl Lane {
    fn new(phase: RunnerPhase) -> Self {
        Self {
            progress: AtomicU32::new(0),
            ticks: AtomicU64::new(0),
            phase: AtomicU8::new(phase_to_u8(phase)),
        }
    }

    fn phase(&self) -> RunnerPhase {
        phase_from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: RunnerPhase) {
        self.phase.store(phase_to_u8(phase), Ordering::Release);
    }
}

/// Shared state of a single race.
#[derive(Debug)]
struct Board {
    race_id: Option<u64>,
    target: u32,
    names: Vec<String>,
    lanes: Vec<Lane>,
    state: RaceState,
    status: AtomicU8,
}

impl Board {
    fn idle(target: u32, names: Vec<String>) -> Self {
        Self::with_status(None, target, names, RaceStatus::Idle, RunnerPhase::Idle)
    }

    fn running(race_id: u64, target: u32, names: Vec<String>) -> Self {
        Self::with_status(
            Some(race_id),
            target,
            names,
            RaceStatus::Running,
            RunnerPhase::Running,
        )
    }

    fn with_status(
        race_id: Option<u64>,
        target: u32,
        names: Vec<String>,
        status: RaceStatus,
        phase: RunnerPhase,
    ) -> Self {
        Self {
            race_id,
            target,
            lanes: names.iter().map(|_| Lane::new(phase)).collect(),
            names,
            state: RaceState::new(),
            status: AtomicU8::new(status_to_u8(status)),
        }
    }

    fn status(&self) -> RaceStatus {
        status_from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: RaceStatus) {
        self.status.store(status_to_u8(status), Ordering::Release);
    }

    fn lane(&self, runner: RunnerId) -> &Lane {
        &self.lanes[runner.index()]
    }

    fn name(&self, runner: RunnerId) -> &str {
        &self.names[runner.index()]
    }

    fn snapshot(&self) -> RaceSnapshot {
        let status = self.status();
        let runners = RunnerId::all()
            .map(|id| {
                let lane = self.lane(id);
                RunnerSnapshot {
                    id,
                    name: self.name(id).to_string(),
                    progress: lane.progress.load(Ordering::Acquire),
                    ticks: lane.ticks.load(Ordering::Acquire),
                    phase: lane.phase(),
                }
            })
            .collect();
        let winner = match status {
            RaceStatus::Finished => self
                .state
                .winner()
                .map(|(runner, _)| self.name(runner).to_string()),
            _ => None,
        };
        RaceSnapshot {
            race_id: self.race_id,
            status,
            target: self.target,
            runners,
            winner,
        }
    }
}

/// Handles of the race currently in flight.
struct ActiveRace {
    race_id: u64,
    runners: Vec<AbortHandle>,
    supervisor: JoinHandle<Result<RaceOutcome>>,
}

/// Runs three-runner races and publishes their events.
pub struct RaceSimulator {
    config: RaceConfig,
    pace: Arc<dyn PaceFactory>,
    events: broadcast::Sender<RaceEvent>,
    board: Arc<Board>,
    last_race_id: u64,
    active: Option<ActiveRace>,
}

impl RaceSimulator {
    /// Simulator with random increments drawn per the config.
    pub fn new(config: RaceConfig) -> Result<Self> {
        let pace = Arc::new(RandomPace::from_config(&config));
        Self::with_pace(config, pace)
    }

    pub fn with_pace(config: RaceConfig, pace: Arc<dyn PaceFactory>) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);
        let board = Arc::new(Board::idle(config.target, config.runners.clone()));
        Ok(Self {
            config,
            pace,
            events,
            board,
            last_race_id: 0,
            active: None,
        })
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Receive progress, winner and cancellation events of future races.
    pub fn subscribe(&self) -> broadcast::Receiver<RaceEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        self.board.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some() && self.board.status() == RaceStatus::Running
    }

    /// Reset the board and launch a new race. Returns its id as soon as the
    /// runner tasks are spawned.
    pub async fn start_race(&mut self) -> Result<u64> {
        self.reset_race().await?;

        self.last_race_id += 1;
        let race_id = self.last_race_id;
        let board = Arc::new(Board::running(
            race_id,
            self.config.target,
            self.config.runners.clone(),
        ));
        self.board = Arc::clone(&board);

        let _ = self.events.send(RaceEvent::Started {
            race_id,
            runners: self.config.runners.clone(),
        });

        let tick = self.config.tick_interval();
        let start = Instant::now();
        let mut handles = Vec::with_capacity(RUNNER_COUNT);
        let mut aborts = Vec::with_capacity(RUNNER_COUNT);
        for runner in RunnerId::all() {
            let task = RunnerTask {
                race_id,
                runner,
                board: Arc::clone(&board),
                source: self.pace.source_for(runner),
                events: self.events.clone(),
                start,
                tick,
            };
            let handle = tokio::spawn(run_progress(task));
            aborts.push(handle.abort_handle());
            handles.push(handle);
        }
        let supervisor = tokio::spawn(supervise(race_id, board, handles, self.events.clone()));

        info!(
            race_id,
            target = self.config.target,
            tick_ms = self.config.tick_interval_ms,
            "race started"
        );
        self.active = Some(ActiveRace {
            race_id,
            runners: aborts,
            supervisor,
        });
        Ok(race_id)
    }

    /// Wait for the active race to produce a winner.
    pub async fn wait(&mut self) -> Result<RaceOutcome> {
        let Some(active) = self.active.as_mut() else {
            bail!("no race is active");
        };
        // Borrow the handle so dropping this future keeps the race cancellable.
        let joined = (&mut active.supervisor).await;
        self.active = None;
        joined.context("race supervisor task failed")?
    }

    /// Cancel any race in flight and return the board to its idle state.
    pub async fn reset_race(&mut self) -> Result<()> {
        if let Some(active) = self.active.take() {
            for runner in &active.runners {
                runner.abort();
            }
            match active.supervisor.await {
                Ok(Ok(outcome)) => {
                    debug!(
                        race_id = active.race_id,
                        winner = %outcome.winner_name,
                        "reset after finished race"
                    );
                }
                Ok(Err(err)) if err.downcast_ref::<RaceCancelledError>().is_some() => {
                    info!(race_id = active.race_id, "race cancelled");
                }
                Ok(Err(err)) => {
                    warn!(race_id = active.race_id, error = %err, "race failed before reset");
                }
                Err(err) => {
                    return Err(anyhow!("race supervisor task failed: {}", err));
                }
            }
        }
        self.board = Arc::new(Board::idle(
            self.config.target,
            self.config.runners.clone(),
        ));
        Ok(())
    }
}

impl Drop for RaceSimulator {
    fn drop(&mut self) {
        // Best-effort stop; do not block in Drop.
        if let Some(active) = &self.active {
            for runner in &active.runners {
                runner.abort();
            }
        }
    }
}

struct RunnerTask {
    race_id: u64,
    runner: RunnerId,
    board: Arc<Board>,
    source: Box<dyn IncrementSource>,
    events: broadcast::Sender<RaceEvent>,
    start: Instant,
    tick: Duration,
}

async fn run_progress(mut task: RunnerTask) -> RunnerExit {
    let board = &task.board;
    let lane = board.lane(task.runner);
    let mut interval = time::interval_at(task.start + task.tick, task.tick);
    // A late tick pushes the schedule back; missed ticks are never replayed.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut progress = 0u32;
    let mut ticks = 0u64;
    while should_continue(progress, board.target, board.state.is_ended()) {
        interval.tick().await;
        ticks += 1;
        progress = advance(progress, task.source.next_increment(), board.target);
        lane.progress.store(progress, Ordering::Release);
        lane.ticks.store(ticks, Ordering::Release);
        let _ = task.events.send(RaceEvent::Progress {
            race_id: task.race_id,
            runner: task.runner,
            progress,
            tick: ticks,
        });
    }

    if progress >= board.target {
        let claim = board.state.claim(task.runner, ticks);
        debug!(
            race_id = task.race_id,
            runner = %board.name(task.runner),
            tick = ticks,
            ended_race = claim.ended_race,
            "runner reached target"
        );
    } else {
        debug!(
            race_id = task.race_id,
            runner = %board.name(task.runner),
            tick = ticks,
            progress,
            "runner stopped"
        );
    }
    lane.set_phase(RunnerPhase::FinishedLoserStopped);

    RunnerExit {
        runner: task.runner,
        progress,
        ticks,
    }
}

async fn supervise(
    race_id: u64,
    board: Arc<Board>,
    runners: Vec<JoinHandle<RunnerExit>>,
    events: broadcast::Sender<RaceEvent>,
) -> Result<RaceOutcome> {
    let mut exits = Vec::with_capacity(runners.len());
    let mut cancelled = false;
    let mut failure = None;
    for handle in runners {
        match handle.await {
            Ok(exit) => exits.push(exit),
            Err(err) if err.is_cancelled() => cancelled = true,
            Err(err) => failure = Some(err.to_string()),
        }
    }

    if let Some(err) = failure {
        board.set_status(RaceStatus::Cancelled);
        let _ = events.send(RaceEvent::Cancelled { race_id });
        bail!("runner task panicked: {}", err);
    }
    if cancelled {
        board.set_status(RaceStatus::Cancelled);
        let _ = events.send(RaceEvent::Cancelled { race_id });
        return Err(RaceCancelledError { race_id }.into());
    }

    let (winner, winning_tick) = board
        .state
        .winner()
        .context("every runner stopped but none claimed the win")?;
    board.lane(winner).set_phase(RunnerPhase::FinishedWinner);
    board.set_status(RaceStatus::Finished);

    exits.sort_by_key(|exit| exit.runner);
    for exit in &exits {
        debug!(
            race_id,
            runner = %board.name(exit.runner),
            progress = exit.progress,
            ticks = exit.ticks,
            "runner exit"
        );
    }

    let name = board.name(winner).to_string();
    info!(race_id, runner = %name, tick = winning_tick, "race won");
    let _ = events.send(RaceEvent::Winner {
        race_id,
        runner: winner,
        name: name.clone(),
        tick: winning_tick,
    });

    Ok(RaceOutcome {
        race_id,
        winner,
        winner_name: name,
        winning_tick,
        final_progress: exits.iter().map(|exit| exit.progress).collect(),
    })
}

fn phase_to_u8(phase: RunnerPhase) -> u8 {
    match phase {
        RunnerPhase::Idle => 0,
        RunnerPhase::Running => 1,
        RunnerPhase::FinishedWinner => 2,
        RunnerPhase::FinishedLoserStopped => 3,
    }
}

fn phase_from_u8(raw: u8) -> RunnerPhase {
    match raw {
        1 => RunnerPhase::Running,
        2 => RunnerPhase::FinishedWinner,
        3 => RunnerPhase::FinishedLoserStopped,
        _ => RunnerPhase::Idle,
    }
}

fn status_to_u8(status: RaceStatus) -> u8 {
    match status {
        RaceStatus::Idle => 0,
        RaceStatus::Running => 1,
        RaceStatus::Finished => 2,
        RaceStatus::Cancelled => 3,
    }
}

fn status_from_u8(raw: u8) -> RaceStatus {
    match raw {
        1 => RaceStatus::Running,
        2 => RaceStatus::Finished,
        3 => RaceStatus::Cancelled,
        _ => RaceStatus::Idle,
    }
}
