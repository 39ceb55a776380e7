//! Test-only helpers for building simulators and inspecting race events.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use crate::core::types::RaceEvent;
use crate::io::config::{RaceConfig, write_config};
use crate::pace::FixedPace;
use crate::simulator::RaceSimulator;

/// Default config with the given target and an event buffer large enough to
/// hold a whole race without lagging.
pub fn config_with_target(target: u32) -> RaceConfig {
    RaceConfig {
        target,
        event_capacity: 4096,
        ..RaceConfig::default()
    }
}

/// Simulator whose runners advance by fixed per-runner increments.
pub fn fixed_simulator(target: u32, increments: &[u32]) -> RaceSimulator {
    RaceSimulator::with_pace(
        config_with_target(target),
        Arc::new(FixedPace::new(increments.to_vec())),
    )
    .expect("valid test config")
}

/// Drain every event currently buffered in `rx`.
pub fn drain_events(rx: &mut broadcast::Receiver<RaceEvent>) -> Vec<RaceEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    events
}

/// Winner notifications among `events`.
pub fn winner_events(events: &[RaceEvent]) -> Vec<&RaceEvent> {
    events
        .iter()
        .filter(|event| matches!(event, RaceEvent::Winner { .. }))
        .collect()
}

/// Temporary working directory for CLI and config tests.
pub struct TestDir {
    dir: tempfile::TempDir,
}

impl TestDir {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `cfg` to `<dir>/.race/config.toml` and return the path.
    pub fn write_config(&self, cfg: &RaceConfig) -> Result<PathBuf> {
        let path = self.path().join(".race").join("config.toml");
        write_config(&path, cfg)?;
        Ok(path)
    }
}
