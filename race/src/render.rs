//! Terminal rendering of race progress.
//!
//! The CLI host is the progress sink: it follows the simulator's event stream
//! and redraws a bar per runner, throttled so a 10ms tick does not flood the
//! terminal.

use std::io::Write;

use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};
use tracing::warn;

use crate::core::types::{RaceEvent, RaceSnapshot, RunnerId, RunnerPhase};

/// Default width of a progress bar, in cells.
pub const BAR_WIDTH: usize = 40;

/// Bar width of each lane in the single-line live status.
pub const STATUS_BAR_WIDTH: usize = 10;

/// `[#####.....]`-style bar for `progress` out of `target`.
pub fn render_bar(progress: u32, target: u32, width: usize) -> String {
    let filled = if target == 0 {
        width
    } else {
        let ratio = u64::from(progress.min(target)) * width as u64 / u64::from(target);
        ratio as usize
    };
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

fn render_lane(name: &str, name_width: usize, progress: u32, target: u32, width: usize) -> String {
    format!(
        "{:<name_width$} {} {:>digits$}/{}",
        name,
        render_bar(progress, target, width),
        progress,
        target,
        digits = target.to_string().len(),
    )
}

/// One line per runner, the winner marked with `*`.
pub fn render_board(snapshot: &RaceSnapshot, width: usize) -> String {
    let name_width = name_width(snapshot.runners.iter().map(|runner| runner.name.as_str()));
    snapshot
        .runners
        .iter()
        .map(|runner| {
            let mut line = render_lane(
                &runner.name,
                name_width,
                runner.progress,
                snapshot.target,
                width,
            );
            if runner.phase == RunnerPhase::FinishedWinner {
                line.push_str(" *");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(str::len).max().unwrap_or(0)
}

/// Host-side mirror of the board, fed from [`RaceEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    target: u32,
    names: Vec<String>,
    progress: Vec<u32>,
    winner: Option<RunnerId>,
    race_id: Option<u64>,
}

impl BoardView {
    pub fn new(target: u32, names: Vec<String>) -> Self {
        Self {
            target,
            progress: vec![0; names.len()],
            names,
            winner: None,
            race_id: None,
        }
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.map(|runner| self.names[runner.index()].as_str())
    }

    pub fn progress(&self) -> &[u32] {
        &self.progress
    }

    /// Fold one event into the view. Returns true once the race is over.
    ///
    /// Events from an older race than the one last started are ignored.
    pub fn apply(&mut self, event: &RaceEvent) -> bool {
        if let RaceEvent::Started { race_id, .. } = event {
            self.race_id = Some(*race_id);
            self.progress.iter_mut().for_each(|value| *value = 0);
            self.winner = None;
            return false;
        }
        if self.race_id.is_some_and(|current| current != event.race_id()) {
            return false;
        }
        match event {
            RaceEvent::Progress {
                runner, progress, ..
            } => {
                if let Some(slot) = self.progress.get_mut(runner.index()) {
                    *slot = (*slot).max(*progress);
                }
                false
            }
            RaceEvent::Winner { runner, .. } => {
                self.winner = Some(*runner);
                true
            }
            RaceEvent::Cancelled { .. } => true,
            RaceEvent::Started { .. } => false,
        }
    }

    /// All lanes on one line, for redrawing in place with `\r`.
    pub fn status_line(&self, width: usize) -> String {
        let digits = self.target.to_string().len();
        self.names
            .iter()
            .zip(&self.progress)
            .map(|(name, progress)| {
                format!(
                    "{} {} {:>digits$}",
                    name,
                    render_bar(*progress, self.target, width),
                    progress,
                )
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Follow race events, redrawing a one-line status of `view` in place on
/// `out` at most once per `redraw`.
///
/// Returns the final view when the race ends or the channel closes, leaving
/// the cursor on a fresh line. The final frame is left to the caller, which
/// renders it from the simulator's snapshot.
pub async fn follow<W: Write>(
    mut rx: broadcast::Receiver<RaceEvent>,
    mut view: BoardView,
    redraw: Duration,
    mut out: W,
) -> BoardView {
    let mut last_draw: Option<Instant> = None;
    loop {
        match rx.recv().await {
            Ok(event) => {
                if view.apply(&event) {
                    break;
                }
                if last_draw.is_none_or(|at| at.elapsed() >= redraw) {
                    let _ = write!(out, "\r{}", view.status_line(STATUS_BAR_WIDTH));
                    let _ = out.flush();
                    last_draw = Some(Instant::now());
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "progress display lagged, some events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    if last_draw.is_some() {
        let _ = writeln!(out);
        let _ = out.flush();
    }
    view
}
