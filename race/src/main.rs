//! Three-runner progress race.
//!
//! `race run` starts three concurrent runners, draws their progress bars on
//! stderr and announces the single winner on stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use race::core::invariants::validate_snapshot;
use race::exit_codes;
use race::io::config::{CONFIG_PATH, RaceConfig, init_config, load_config};
use race::logging;
use race::render::{BAR_WIDTH, BoardView, follow, render_board};
use race::simulator::{RaceCancelledError, RaceSimulator};
use tokio::time::Duration;
use tracing::warn;

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(
    name = "race",
    version,
    about = "Three runners race to a target; the first to arrive wins"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `.race/config.toml` if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Run one race and announce the winner.
    Run {
        /// Config file (defaults apply when it does not exist).
        #[arg(long, default_value = CONFIG_PATH)]
        config: PathBuf,
        /// Seed for reproducible increments, overriding the config.
        #[arg(long)]
        seed: Option<u64>,
        /// Do not draw progress bars.
        #[arg(short, long)]
        quiet: bool,
        /// Print the race outcome as JSON instead of the announcement.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML.
    Config {
        #[arg(long, default_value = CONFIG_PATH)]
        config: PathBuf,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            if err.downcast_ref::<RaceCancelledError>().is_some() {
                exit_codes::CANCELLED
            } else {
                exit_codes::INVALID
            }
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(force),
        Command::Run {
            config,
            seed,
            quiet,
            json,
        } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("build tokio runtime")?;
            runtime.block_on(cmd_run(&config, seed, quiet, json))
        }
        Command::Config { config } => cmd_config(&config),
    }
}

fn cmd_init(force: bool) -> Result<i32> {
    let path = Path::new(CONFIG_PATH);
    if init_config(path, force)? {
        println!("wrote {}", path.display());
    } else {
        println!("{} already exists (use --force to overwrite)", path.display());
    }
    Ok(exit_codes::OK)
}

fn cmd_config(path: &Path) -> Result<i32> {
    let cfg = load_config(path)?;
    print!("{}", render_config(&cfg)?);
    Ok(exit_codes::OK)
}

fn render_config(cfg: &RaceConfig) -> Result<String> {
    toml::to_string_pretty(cfg).context("serialize config toml")
}

async fn cmd_run(path: &Path, seed: Option<u64>, quiet: bool, json: bool) -> Result<i32> {
    let mut cfg = load_config(path)?;
    if seed.is_some() {
        cfg.seed = seed;
    }
    let mut sim = RaceSimulator::new(cfg)?;

    let printer = (!quiet).then(|| {
        let view = BoardView::new(sim.config().target, sim.config().runners.clone());
        tokio::spawn(follow(
            sim.subscribe(),
            view,
            REDRAW_INTERVAL,
            std::io::stderr(),
        ))
    });

    let race_id = sim.start_race().await?;
    let outcome = tokio::select! {
        outcome = sim.wait() => outcome?,
        _ = tokio::signal::ctrl_c() => {
            warn!(race_id, "interrupted, cancelling race");
            sim.reset_race().await?;
            return Err(RaceCancelledError { race_id }.into());
        }
    };

    if let Some(printer) = printer {
        printer.await.context("progress display task failed")?;
    }

    let snapshot = sim.snapshot();
    let errors = validate_snapshot(&snapshot);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("serialize outcome")?
        );
    } else {
        if !quiet {
            eprintln!("{}\n", render_board(&snapshot, BAR_WIDTH));
        }
        println!("{} won!", outcome.winner_name);
    }
    Ok(exit_codes::OK)
}
