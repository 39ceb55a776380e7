//! Race configuration stored under `.race/config.toml`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::RUNNER_COUNT;

/// Default location of the config file, relative to the working directory.
pub const CONFIG_PATH: &str = ".race/config.toml";

/// Race configuration (TOML).
///
/// Missing fields fall back to the classic three-bar race: target 1000,
/// one tick every 10ms, increments drawn from `[1, 10]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RaceConfig {
    /// Progress value a runner must reach to finish.
    pub target: u32,

    /// Interval between two progress increments of the same runner.
    pub tick_interval_ms: u64,

    /// Smallest random increment per tick (inclusive).
    pub increment_min: u32,

    /// Largest random increment per tick (inclusive).
    pub increment_max: u32,

    /// Display names, one per runner, in index order.
    pub runners: Vec<String>,

    /// Seed for reproducible increments. Unset draws from OS entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            target: 1000,
            tick_interval_ms: 10,
            increment_min: 1,
            increment_max: 10,
            runners: vec!["Green".to_string(), "Red".to_string(), "Blue".to_string()],
            seed: None,
            event_capacity: 256,
        }
    }
}

impl RaceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target == 0 {
            return Err(anyhow!("target must be > 0"));
        }
        if self.tick_interval_ms == 0 {
            return Err(anyhow!("tick_interval_ms must be > 0"));
        }
        if self.increment_min == 0 {
            return Err(anyhow!("increment_min must be > 0"));
        }
        if self.increment_min > self.increment_max {
            return Err(anyhow!(
                "increment_min {} exceeds increment_max {}",
                self.increment_min,
                self.increment_max
            ));
        }
        if self.runners.len() != RUNNER_COUNT {
            return Err(anyhow!(
                "runners must name exactly {} runners, got {}",
                RUNNER_COUNT,
                self.runners.len()
            ));
        }
        let mut seen = HashSet::new();
        for name in &self.runners {
            if name.trim().is_empty() {
                return Err(anyhow!("runner names must be non-empty"));
            }
            if !seen.insert(name.as_str()) {
                return Err(anyhow!("duplicate runner name '{}'", name));
            }
        }
        if self.event_capacity == 0 {
            return Err(anyhow!("event_capacity must be > 0"));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RaceConfig::default()`.
pub fn load_config(path: &Path) -> Result<RaceConfig> {
    if !path.exists() {
        let cfg = RaceConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RaceConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RaceConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write the default config unless one exists. Returns true if written.
pub fn init_config(path: &Path, force: bool) -> Result<bool> {
    if !force && path.exists() {
        return Ok(false);
    }
    write_config(path, &RaceConfig::default())?;
    Ok(true)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
