//! Semantic invariants of a race board.

use crate::core::types::{RaceSnapshot, RaceStatus, RunnerPhase};

/// Check a snapshot against the race invariants:
/// - At most one `FinishedWinner`, and exactly one once the race is finished
/// - Reported winner name matches the winning runner
/// - Progress never exceeds the target
/// - An idle board has zero progress and idle runners
/// - A finished race has no runner still running
pub fn validate_snapshot(snapshot: &RaceSnapshot) -> Vec<String> {
    let mut errors = Vec::new();

    let winners: Vec<_> = snapshot
        .runners
        .iter()
        .filter(|runner| runner.phase == RunnerPhase::FinishedWinner)
        .collect();
    if winners.len() > 1 {
        let names: Vec<&str> = winners.iter().map(|runner| runner.name.as_str()).collect();
        errors.push(format!("multiple winners claimed: {}", names.join(", ")));
    }

    for runner in &snapshot.runners {
        if runner.progress > snapshot.target {
            errors.push(format!(
                "{}: progress {} exceeds target {}",
                runner.name, runner.progress, snapshot.target
            ));
        }
    }

    match snapshot.status {
        RaceStatus::Finished => {
            if winners.len() != 1 {
                errors.push(format!(
                    "finished race must have exactly one winner, found {}",
                    winners.len()
                ));
            }
            match (&snapshot.winner, winners.first()) {
                (Some(name), Some(runner)) if *name != runner.name => errors.push(format!(
                    "winner '{}' does not match winning runner '{}'",
                    name, runner.name
                )),
                (None, _) => errors.push("finished race has no winner name".to_string()),
                _ => {}
            }
            for runner in &snapshot.runners {
                if !runner.phase.is_finished() {
                    errors.push(format!(
                        "{}: still {:?} after race finished",
                        runner.name, runner.phase
                    ));
                }
            }
        }
        RaceStatus::Idle => {
            for runner in &snapshot.runners {
                if runner.progress != 0 || runner.phase != RunnerPhase::Idle {
                    errors.push(format!(
                        "{}: idle board must be reset (progress {}, phase {:?})",
                        runner.name, runner.progress, runner.phase
                    ));
                }
            }
        }
        RaceStatus::Running | RaceStatus::Cancelled => {}
    }

    if snapshot.status != RaceStatus::Finished && snapshot.winner.is_some() {
        errors.push(format!(
            "winner reported while race is {:?}",
            snapshot.status
        ));
    }

    errors
}
