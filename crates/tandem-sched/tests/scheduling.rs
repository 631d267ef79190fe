//! End-to-end scheduler behavior over whole action sets.

use proptest::prelude::*;
use tandem_core::{AttrRef, BuildError};
use tandem_sched::{DdgScheduler, RoundClock, Scheduler, SchedulerConfig};
use tandem_test_utils::{run_log, RecordingAction, RunLog};

fn attr(i: usize) -> AttrRef {
    AttrRef::new("dag", format!("a{i}"))
}

/// Build a scheduler whose action `i` writes `a{i}` and reads the
/// attributes written by `reads_for[i]` (all earlier actions).
fn dag_scheduler(
    reads_for: &[Vec<usize>],
    priorities: &[i32],
    config: SchedulerConfig,
) -> (DdgScheduler, RunLog) {
    let log = run_log();
    let mut sched = DdgScheduler::new(config);
    for (i, deps) in reads_for.iter().enumerate() {
        let reads = deps.iter().map(|&d| attr(d)).collect();
        sched
            .add_action(Box::new(
                RecordingAction::new(&format!("a{i}"), reads, vec![attr(i)], &log)
                    .with_priority(priorities[i]),
            ))
            .unwrap();
    }
    sched.build().unwrap();
    (sched, log)
}

/// Normalize raw proptest input into a DAG: action `i` may only read
/// from actions `< i`, so the graph is acyclic by construction.
fn normalize(raw: &[Vec<usize>]) -> Vec<Vec<usize>> {
    raw.iter()
        .enumerate()
        .map(|(i, deps)| {
            if i == 0 {
                Vec::new()
            } else {
                let mut deps: Vec<usize> = deps.iter().map(|d| d % i).collect();
                deps.sort_unstable();
                deps.dedup();
                deps
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// No matter the priorities, the concurrency bound, or the
    /// registration interleaving, a producer always completes before
    /// any of its consumers starts.
    #[test]
    fn producers_always_complete_before_consumers(
        raw in prop::collection::vec(prop::collection::vec(0usize..16, 0..4), 1..10),
        priorities in prop::collection::vec(-2i32..3, 10),
        workers in 0usize..4,
    ) {
        let reads_for = normalize(&raw);
        let (mut sched, log) =
            dag_scheduler(&reads_for, &priorities, SchedulerConfig::concurrent(workers));
        sched.run_round(RoundClock::zero()).unwrap();

        let order = log.lock().unwrap().clone();
        prop_assert_eq!(order.len(), reads_for.len());
        let pos = |i: usize| {
            order
                .iter()
                .position(|n| n == &format!("a{i}"))
                .unwrap()
        };
        for (i, deps) in reads_for.iter().enumerate() {
            for &d in deps {
                prop_assert!(pos(d) < pos(i), "a{} ran before its producer a{}", i, d);
            }
        }
    }

    /// The published store is identical across concurrency settings:
    /// same attributes, same values, same iteration order.
    #[test]
    fn store_layout_is_independent_of_concurrency(
        raw in prop::collection::vec(prop::collection::vec(0usize..16, 0..4), 1..10),
    ) {
        let reads_for = normalize(&raw);
        let priorities = vec![0; reads_for.len()];

        let run = |config: SchedulerConfig| {
            let (mut sched, _log) = dag_scheduler(&reads_for, &priorities, config);
            sched.run_round(RoundClock::zero()).unwrap();
            sched
                .store()
                .iter()
                .map(|(a, v)| (a.clone(), v.clone()))
                .collect::<Vec<_>>()
        };

        prop_assert_eq!(
            run(SchedulerConfig::sequential()),
            run(SchedulerConfig::concurrent(0))
        );
    }
}

#[test]
fn chain_round_produces_every_attribute() {
    let (x, y, z) = (
        AttrRef::new("m", "x"),
        AttrRef::new("m", "y"),
        AttrRef::new("m", "z"),
    );
    let log = run_log();
    let mut sched = DdgScheduler::new(SchedulerConfig::concurrent(2));
    sched
        .add_action(Box::new(RecordingAction::new(
            "a",
            vec![],
            vec![x.clone()],
            &log,
        )))
        .unwrap();
    sched
        .add_action(Box::new(RecordingAction::new(
            "b",
            vec![x.clone()],
            vec![y.clone()],
            &log,
        )))
        .unwrap();
    sched
        .add_action(Box::new(RecordingAction::new(
            "c",
            vec![x.clone(), y.clone()],
            vec![z.clone()],
            &log,
        )))
        .unwrap();
    sched.build().unwrap();
    sched.run_round(RoundClock::zero()).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    for a in [&x, &y, &z] {
        assert!(sched.store().get(a).is_some(), "missing {a}");
    }
}

#[test]
fn mutual_reads_report_both_cycle_members() {
    let log = run_log();
    let (x, y) = (AttrRef::new("m", "x"), AttrRef::new("m", "y"));
    let mut sched = DdgScheduler::default();
    sched
        .add_action(Box::new(RecordingAction::new(
            "a",
            vec![y.clone()],
            vec![x.clone()],
            &log,
        )))
        .unwrap();
    sched
        .add_action(Box::new(RecordingAction::new("b", vec![x], vec![y], &log)))
        .unwrap();

    assert_eq!(
        sched.build().unwrap_err(),
        BuildError::CycleDetected {
            members: vec!["a".into(), "b".into()],
        }
    );
    assert!(!sched.is_built());
}

#[test]
fn repeated_rounds_accumulate_into_the_store() {
    let x = AttrRef::new("m", "x");
    let log = run_log();
    let mut sched = DdgScheduler::default();
    sched
        .add_action(Box::new(RecordingAction::new(
            "a",
            vec![],
            vec![x.clone()],
            &log,
        )))
        .unwrap();
    sched.build().unwrap();

    for _ in 0..3 {
        sched.run_round(RoundClock::zero()).unwrap();
    }
    assert_eq!(log.lock().unwrap().len(), 3);
    assert_eq!(sched.store().len(), 1);
    assert_eq!(sched.last_metrics().dispatched, 1);
}
