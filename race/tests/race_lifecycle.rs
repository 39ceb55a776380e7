//! Race-level scenarios driven through `RaceSimulator`.
//!
//! Deterministic scenarios run on a paused tokio clock, so tick `n` of every
//! runner fires at the same virtual instant. The stress test at the bottom
//! uses a real multi-threaded runtime to exercise the atomic claim under
//! true parallelism.

use std::collections::HashMap;
use std::sync::Arc;

use race::core::invariants::validate_snapshot;
use race::core::progress::worst_case_ticks;
use race::core::types::{RaceEvent, RaceStatus, RunnerId, RunnerPhase};
use race::io::config::RaceConfig;
use race::pace::RandomPace;
use race::simulator::RaceSimulator;
use race::test_support::{config_with_target, drain_events, fixed_simulator, winner_events};
use tokio::task;
use tokio::time::{self, Duration, Instant, sleep};

/// Every runner advances by 10, so all three reach 1000 on tick 100.
///
/// The tie goes to the lowest index; the others finish as stopped losers.
#[tokio::test(start_paused = true)]
async fn simultaneous_finish_goes_to_lowest_index() {
    let mut sim = fixed_simulator(1000, &[10, 10, 10]);
    let mut rx = sim.subscribe();

    sim.start_race().await.expect("start");
    let outcome = sim.wait().await.expect("wait");

    assert_eq!(outcome.winner, RunnerId(0));
    assert_eq!(outcome.winner_name, "Green");
    assert_eq!(outcome.winning_tick, 100);
    assert_eq!(outcome.final_progress, vec![1000, 1000, 1000]);

    let snapshot = sim.snapshot();
    assert!(validate_snapshot(&snapshot).is_empty());
    assert_eq!(snapshot.status, RaceStatus::Finished);
    assert_eq!(snapshot.winner.as_deref(), Some("Green"));
    let phases: Vec<RunnerPhase> = snapshot.runners.iter().map(|r| r.phase).collect();
    assert_eq!(
        phases,
        vec![
            RunnerPhase::FinishedWinner,
            RunnerPhase::FinishedLoserStopped,
            RunnerPhase::FinishedLoserStopped,
        ]
    );

    let events = drain_events(&mut rx);
    assert_eq!(winner_events(&events).len(), 1);
    assert!(matches!(
        events.last(),
        Some(RaceEvent::Winner { runner: RunnerId(0), tick: 100, .. })
    ));
}

/// Runner A reaches 1000 on tick 50 while B and C sit at 400 and 300.
///
/// A is announced once; B and C stop no later than their tick-51 increment.
#[tokio::test(start_paused = true)]
async fn leader_wins_and_others_stop_within_one_tick() {
    let mut sim = fixed_simulator(1000, &[20, 8, 6]);
    let mut rx = sim.subscribe();

    sim.start_race().await.expect("start");
    let outcome = sim.wait().await.expect("wait");

    assert_eq!(outcome.winner, RunnerId(0));
    assert_eq!(outcome.winning_tick, 50);

    let snapshot = sim.snapshot();
    assert!(validate_snapshot(&snapshot).is_empty());
    let b = &snapshot.runners[1];
    let c = &snapshot.runners[2];
    assert!([400, 408].contains(&b.progress), "B at {}", b.progress);
    assert!([300, 306].contains(&c.progress), "C at {}", c.progress);
    assert!(b.ticks <= 51 && c.ticks <= 51);

    let events = drain_events(&mut rx);
    let winners = winner_events(&events);
    assert_eq!(winners.len(), 1);
    assert!(matches!(
        winners[0],
        RaceEvent::Winner { name, .. } if name == "Green"
    ));
}

#[tokio::test(start_paused = true)]
async fn random_race_terminates_within_worst_case_bound() {
    let config = RaceConfig {
        seed: Some(1234),
        ..config_with_target(1000)
    };
    let tick = config.tick_interval();
    let bound = worst_case_ticks(config.target, config.increment_min);
    let mut sim = RaceSimulator::new(config).expect("simulator");

    let started = Instant::now();
    sim.start_race().await.expect("start");
    let outcome = sim.wait().await.expect("wait");

    assert!(outcome.winning_tick <= bound);
    assert!(started.elapsed() <= tick * (bound as u32 + 1));
    let snapshot = sim.snapshot();
    assert!(validate_snapshot(&snapshot).is_empty());
    assert!(snapshot.runners.iter().all(|r| r.phase.is_finished()));
}

#[tokio::test(start_paused = true)]
async fn progress_is_monotonic_and_bounded() {
    let config = RaceConfig {
        seed: Some(99),
        ..config_with_target(300)
    };
    let pace = Arc::new(RandomPace::from_config(&config));
    let mut sim = RaceSimulator::with_pace(config.clone(), pace).expect("simulator");
    let mut rx = sim.subscribe();

    sim.start_race().await.expect("start");
    sim.wait().await.expect("wait");

    let mut last: HashMap<RunnerId, (u32, u64)> = HashMap::new();
    for event in drain_events(&mut rx) {
        if let RaceEvent::Progress {
            runner,
            progress,
            tick,
            ..
        } = event
        {
            let (prev_progress, prev_tick) = last.get(&runner).copied().unwrap_or((0, 0));
            assert!(progress >= prev_progress, "{} went backwards", runner);
            assert!(progress <= config.target);
            assert_eq!(tick, prev_tick + 1);
            assert!(progress - prev_progress <= config.increment_max);
            last.insert(runner, (progress, tick));
        }
    }
    assert_eq!(last.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn seeded_races_replay_identically() {
    let config = RaceConfig {
        seed: Some(2024),
        ..config_with_target(500)
    };
    let mut first = RaceSimulator::new(config.clone()).expect("simulator");
    let mut second = RaceSimulator::new(config).expect("simulator");

    first.start_race().await.expect("start");
    let a = first.wait().await.expect("wait");
    second.start_race().await.expect("start");
    let b = second.wait().await.expect("wait");

    assert_eq!(a.winner, b.winner);
    assert_eq!(a.winning_tick, b.winning_tick);
    assert_eq!(a.final_progress[a.winner.index()], 500);
}

#[tokio::test(start_paused = true)]
async fn reset_cancels_runners_and_zeroes_board() {
    let mut sim = fixed_simulator(1000, &[1]);
    let mut rx = sim.subscribe();

    sim.start_race().await.expect("start");
    sleep(Duration::from_millis(55)).await;
    let mid = sim.snapshot();
    assert_eq!(mid.status, RaceStatus::Running);
    assert!(mid.runners.iter().all(|r| r.progress > 0));

    sim.reset_race().await.expect("reset");
    let reset = sim.snapshot();
    assert_eq!(reset.status, RaceStatus::Idle);
    assert_eq!(reset.race_id, None);
    assert!(validate_snapshot(&reset).is_empty());
    assert!(!sim.is_running());

    // No lingering task may move the board after the reset.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(sim.snapshot(), reset);

    let events = drain_events(&mut rx);
    assert!(winner_events(&events).is_empty());
    assert!(events.contains(&RaceEvent::Cancelled { race_id: 1 }));
    let err = sim.wait().await.expect_err("no active race");
    assert!(err.to_string().contains("no race is active"));
}

#[tokio::test(start_paused = true)]
async fn starting_again_cancels_the_previous_race() {
    let mut sim = fixed_simulator(100, &[1]);
    let mut rx = sim.subscribe();

    assert_eq!(sim.start_race().await.expect("start"), 1);
    sleep(Duration::from_millis(35)).await;
    assert_eq!(sim.start_race().await.expect("restart"), 2);

    let fresh = sim.snapshot();
    assert_eq!(fresh.race_id, Some(2));
    assert!(fresh.runners.iter().all(|r| r.progress == 0));

    let outcome = sim.wait().await.expect("wait");
    assert_eq!(outcome.race_id, 2);
    assert_eq!(outcome.winning_tick, 100);

    let events = drain_events(&mut rx);
    assert!(events.contains(&RaceEvent::Cancelled { race_id: 1 }));
    let winners = winner_events(&events);
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].race_id(), 2);
    assert!(
        events
            .iter()
            .filter(|event| event.race_id() == 1)
            .all(|event| !matches!(event, RaceEvent::Winner { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn reset_after_finish_keeps_single_notification() {
    let mut sim = fixed_simulator(50, &[5, 7, 9]);
    let mut rx = sim.subscribe();

    sim.start_race().await.expect("start");
    // Let the race finish without calling wait.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(sim.snapshot().status, RaceStatus::Finished);
    assert_eq!(sim.snapshot().winner.as_deref(), Some("Blue"));

    sim.reset_race().await.expect("reset");
    let events = drain_events(&mut rx);
    assert_eq!(winner_events(&events).len(), 1);
    assert!(!events.iter().any(|event| matches!(event, RaceEvent::Cancelled { .. })));
}

/// The clock jumps 100ms before any runner is polled, as when the host
/// stalls. Each runner takes one late tick and then waits a full interval
/// again instead of replaying the ticks it missed.
#[tokio::test(start_paused = true)]
async fn stalled_runners_do_not_replay_missed_ticks() {
    let mut sim = fixed_simulator(1000, &[1]);
    let mut rx = sim.subscribe();

    sim.start_race().await.expect("start");
    time::advance(Duration::from_millis(100)).await;
    for _ in 0..3 {
        task::yield_now().await;
    }
    let after_stall = sim.snapshot();
    assert!(
        after_stall.runners.iter().all(|r| r.ticks == 1),
        "ticks after stall: {:?}",
        after_stall.runners.iter().map(|r| r.ticks).collect::<Vec<_>>()
    );

    time::advance(Duration::from_millis(9)).await;
    task::yield_now().await;
    assert!(sim.snapshot().runners.iter().all(|r| r.ticks == 1));

    time::advance(Duration::from_millis(1)).await;
    for _ in 0..3 {
        task::yield_now().await;
    }
    assert!(sim.snapshot().runners.iter().all(|r| r.ticks == 2));

    let progress_events = drain_events(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, RaceEvent::Progress { .. }))
        .count();
    assert_eq!(progress_events, 6);
    sim.reset_race().await.expect("reset");
}

/// Many short races on a real multi-threaded runtime: every race ends with
/// exactly one winner notification and a board that passes the invariants.
#[tokio::test(flavor = "multi_thread", worker_threads = 3)]
async fn parallel_races_announce_exactly_one_winner() {
    let config = RaceConfig {
        tick_interval_ms: 1,
        ..config_with_target(40)
    };
    let mut sim = RaceSimulator::new(config).expect("simulator");
    let mut rx = sim.subscribe();

    for _ in 0..25 {
        let race_id = sim.start_race().await.expect("start");
        let outcome = sim.wait().await.expect("wait");
        assert_eq!(outcome.race_id, race_id);

        let snapshot = sim.snapshot();
        let errors = validate_snapshot(&snapshot);
        assert!(errors.is_empty(), "race {}: {:?}", race_id, errors);

        let events = drain_events(&mut rx);
        let winners = winner_events(&events);
        assert_eq!(winners.len(), 1, "race {}", race_id);
        assert!(matches!(
            winners[0],
            RaceEvent::Winner { runner, .. } if *runner == outcome.winner
        ));
    }
}
