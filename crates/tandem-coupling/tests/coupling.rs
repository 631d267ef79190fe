//! End-to-end coupling scenarios.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tandem_action::FnAction;
use tandem_core::{ActionError, AttrRef, TimeError};
use tandem_coupling::{Agent, AgentState, Coupling, CouplingError};
use tandem_sched::{DdgScheduler, Scheduler};
use tandem_test_utils::ScriptedChannel;

type Trace = Arc<Mutex<Vec<(f64, Vec<f64>)>>>;

/// Agent whose single action writes `[time]` to `<name>.temp`.
fn clock_writer(name: &str, dt: f64) -> Agent {
    let mut sched = DdgScheduler::default();
    let out = AttrRef::new(name, "temp");
    let target = out.clone();
    sched
        .add_action(Box::new(FnAction::new(
            "emit_temp",
            vec![],
            vec![out],
            move |ctx| ctx.set(target.clone(), vec![ctx.time()]),
        )))
        .unwrap();
    Agent::new(name, dt, Box::new(sched)).unwrap()
}

/// Register an action on `agent` that records `(time, value)` of `attr`
/// every sub-step. Must be registered after the link so it reads the
/// interpolated attribute.
fn record_attr(coupling: &mut Coupling, agent: &str, attr: AttrRef) -> Trace {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&trace);
    let read = attr.clone();
    coupling
        .agent_mut(agent)
        .unwrap()
        .scheduler_mut()
        .unwrap()
        .add_action(Box::new(FnAction::new(
            "record",
            vec![attr],
            vec![],
            move |ctx| {
                let value = ctx
                    .get(&read)
                    .ok_or_else(|| ActionError::Failed {
                        reason: "nothing to record".into(),
                    })?
                    .to_vec();
                sink.lock().unwrap().push((ctx.time(), value));
                Ok(())
            },
        )))
        .unwrap();
    trace
}

fn two_rate_coupling() -> (Coupling, Trace) {
    let mut coupling = Coupling::new();
    coupling.add_agent(clock_writer("solid", 1.0)).unwrap();
    coupling.add_agent(clock_writer("fluid", 0.5)).unwrap();
    let bridged = coupling
        .link("solid", AttrRef::new("solid", "temp"), "fluid")
        .unwrap();
    assert_eq!(bridged, AttrRef::new("fluid", "temp_in"));
    let trace = record_attr(&mut coupling, "fluid", bridged);
    (coupling, trace)
}

#[test]
fn two_rate_agents_meet_every_checkpoint() {
    let (mut coupling, trace) = two_rate_coupling();
    coupling.run_to_time(2.0).unwrap();

    assert_eq!(coupling.time(), 2.0);
    assert_eq!(coupling.rounds(), 2);
    assert_eq!(coupling.agent("solid").unwrap().time(), 2.0);
    assert_eq!(coupling.agent("fluid").unwrap().time(), 2.0);

    // The fast agent saw the bridged attribute at every sub-step. The
    // first round has a single sample (held constant); the second round
    // interpolates between the t=1 and t=2 checkpoints.
    let seen = trace.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (0.5, vec![1.0]),
            (1.0, vec![1.0]),
            (1.5, vec![1.5]),
            (2.0, vec![2.0]),
        ]
    );
}

#[test]
fn identical_couplings_run_identically() {
    let run = || {
        let (mut coupling, trace) = two_rate_coupling();
        coupling.run_to_time(3.0).unwrap();
        let store: Vec<_> = coupling
            .agent("fluid")
            .unwrap()
            .scheduler()
            .unwrap()
            .store()
            .iter()
            .map(|(a, v)| (a.clone(), v.clone()))
            .collect();
        let seen = trace.lock().unwrap().clone();
        (seen, store)
    };
    assert_eq!(run(), run());
}

#[test]
fn failing_agent_aborts_the_round_without_moving_global_time() {
    let mut coupling = Coupling::new();
    coupling.add_agent(clock_writer("solid", 1.0)).unwrap();

    // Fails on any sub-step past t=1.
    let mut sched = DdgScheduler::default();
    let out = AttrRef::new("flaky", "q");
    let target = out.clone();
    sched
        .add_action(Box::new(FnAction::new(
            "solve",
            vec![],
            vec![out],
            move |ctx| {
                if ctx.time() > 1.0 {
                    return Err(ActionError::Failed {
                        reason: "solver diverged".into(),
                    });
                }
                ctx.set(target.clone(), vec![0.0])
            },
        )))
        .unwrap();
    coupling
        .add_agent(Agent::new("flaky", 1.0, Box::new(sched)).unwrap())
        .unwrap();

    coupling.run_to_time(1.0).unwrap();
    assert_eq!(coupling.time(), 1.0);

    let err = coupling.run_to_time(2.0).unwrap_err();
    assert!(matches!(
        err,
        CouplingError::Round { ref agent, .. } if agent == "flaky"
    ));
    assert_eq!(coupling.time(), 1.0);

    // Teardown still works after the failure, and stays idempotent.
    coupling.finalize().unwrap();
    coupling.finalize().unwrap();
    assert_eq!(
        coupling.agent("flaky").unwrap().state(),
        AgentState::Finalized
    );
}

#[test]
fn checkpoint_not_reachable_by_an_agent_is_refused() {
    let mut coupling = Coupling::new();
    coupling.add_agent(clock_writer("slow", 1.0)).unwrap();
    coupling.add_agent(clock_writer("odd", 0.4)).unwrap();

    // Checkpoint width is 1.0; 0.4 does not divide it.
    let err = coupling.run_to_time(1.0).unwrap_err();
    assert!(matches!(
        err,
        CouplingError::Time(TimeError::UnreachableTarget { .. })
    ));
    assert_eq!(coupling.time(), 0.0);
}

#[test]
fn external_channel_gates_each_round() {
    let boundary = AttrRef::new("env", "wall_temp");

    let mut sched = DdgScheduler::default();
    let out = AttrRef::new("fluid", "copy");
    let (read, target) = (boundary.clone(), out.clone());
    sched
        .add_action(Box::new(FnAction::new(
            "copy_boundary",
            vec![boundary.clone()],
            vec![out.clone()],
            move |ctx| {
                let v = ctx
                    .get(&read)
                    .ok_or_else(|| ActionError::Failed {
                        reason: "boundary missing".into(),
                    })?
                    .to_vec();
                ctx.set(target.clone(), v)
            },
        )))
        .unwrap();

    let mut channel = ScriptedChannel::new();
    channel.push_values(&[300.0]);
    channel.push_values(&[310.0]);

    let mut coupling = Coupling::new();
    coupling
        .add_agent(Agent::new("fluid", 1.0, Box::new(sched)).unwrap())
        .unwrap();
    coupling
        .attach_external(
            "fluid",
            boundary,
            Box::new(channel),
            Duration::from_millis(10),
        )
        .unwrap();

    coupling.run_to_time(2.0).unwrap();
    assert_eq!(
        coupling
            .agent("fluid")
            .unwrap()
            .scheduler()
            .unwrap()
            .store()
            .get(&out)
            .unwrap(),
        &[310.0]
    );

    // No third payload queued: the next round fails and time holds.
    let err = coupling.run_to_time(3.0).unwrap_err();
    assert!(matches!(err, CouplingError::Round { .. }));
    assert_eq!(coupling.time(), 2.0);
}
