//! Data-dependency-graph scheduler.
//!
//! [`DdgScheduler`] derives execution order from the dependency graph
//! built at `build()` time. Each round a single control loop computes
//! readiness from dependency counts, dispatches ready actions to a
//! scoped worker pool over a crossbeam channel, and merges staged
//! outputs as completions arrive. Independent actions run concurrently
//! up to the configured bound; a failure aborts remaining dispatch and
//! surfaces the first error.
//!
//! # Staging
//!
//! Workers never touch the attribute store. Each action stages its
//! outputs in its [`RoundContext`]; consumers' input snapshots are cut
//! from producers' staged buffers, and the store is published from the
//! stages in registration order only after the whole round succeeds.
//! A failed round therefore leaves the store exactly as the previous
//! round left it.

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use indexmap::{IndexMap, IndexSet};
use log::warn;
use tandem_action::{Action, RoundContext};
use tandem_core::{
    ActionId, AttrRef, AttrStore, AttrValue, BuildError, RoundError, SyncError,
};
use tandem_sync::Semaphore;

use crate::config::SchedulerConfig;
use crate::graph::{build_graph, DepGraph};
use crate::metrics::RoundMetrics;
use crate::round::{Completion, CompletionResult, RoundShared};
use crate::scheduler::{Registry, RoundClock, RoundReport, Scheduler};

/// One unit of dispatch: an action index plus its prepared context.
struct Job {
    index: usize,
    ctx: RoundContext,
}

/// Scheduler deriving execution order from declared read/write sets.
pub struct DdgScheduler {
    registry: Registry,
    config: SchedulerConfig,
    graph: Option<DepGraph>,
    last_metrics: RoundMetrics,
    aborted_rounds: u64,
}

impl Default for DdgScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl DdgScheduler {
    /// Create a scheduler with the given configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
            graph: None,
            last_metrics: RoundMetrics::default(),
            aborted_rounds: 0,
        }
    }

    /// Metrics from the most recent round (successful or aborted).
    pub fn last_metrics(&self) -> &RoundMetrics {
        &self.last_metrics
    }

    /// Pick the next dispatchable action: dependency count zero, not
    /// yet dispatched, and no overlap with claimed attributes. Ties go
    /// to higher priority, then registration order.
    fn pick_next(
        actions: &[Box<dyn Action>],
        deps: &[usize],
        dispatched: &[bool],
        claimed: &IndexSet<AttrRef>,
    ) -> Option<usize> {
        let mut best: Option<usize> = None;
        for i in 0..actions.len() {
            if dispatched[i] || deps[i] != 0 {
                continue;
            }
            let conflicted = actions[i].reads().iter().any(|a| claimed.contains(a))
                || actions[i].writes().iter().any(|a| claimed.contains(a));
            if conflicted {
                continue;
            }
            best = match best {
                Some(b) if actions[b].priority() >= actions[i].priority() => Some(b),
                _ => Some(i),
            };
        }
        best
    }

    /// Cut the input snapshot for an action: sibling-written reads come
    /// from the producer's staged outputs, external reads from the
    /// store.
    fn snapshot_inputs(
        action: &dyn Action,
        graph: &DepGraph,
        staged: &[Option<IndexMap<AttrRef, AttrValue>>],
        store: &AttrStore,
    ) -> IndexMap<AttrRef, AttrValue> {
        let mut inputs = IndexMap::new();
        for attr in action.reads() {
            let value = match graph.writer_of.get(&attr) {
                Some(&w) => staged[w].as_ref().and_then(|out| out.get(&attr)).cloned(),
                None => store.get(&attr).map(<[f64]>::to_vec),
            };
            if let Some(v) = value {
                inputs.insert(attr, v);
            }
        }
        inputs
    }
}

/// Worker body: run jobs until the channel closes, posting completions
/// and returning the dispatch permit after each one.
fn worker_loop(
    jobs: Receiver<Job>,
    shared: &RoundShared,
    actions: &[Box<dyn Action>],
    sem: Option<&Semaphore>,
) {
    while let Ok(mut job) = jobs.recv() {
        // A job can land after the round was aborted; skip the work and
        // report back as cancelled so the control loop's accounting
        // still balances.
        let aborted = shared.is_aborted().unwrap_or(true);
        let start = Instant::now();
        let result = if aborted {
            CompletionResult::Cancelled
        } else {
            match actions[job.index].run(&mut job.ctx) {
                Ok(()) => CompletionResult::Done(job.ctx.into_outputs()),
                Err(e) => CompletionResult::Failed(e),
            }
        };
        let completion = Completion {
            index: job.index,
            result,
            elapsed_us: start.elapsed().as_micros() as u64,
        };
        if let Some(sem) = sem {
            let _ = sem.release();
        }
        if shared.post(completion).is_err() {
            warn!("worker lost round coordination; exiting");
            break;
        }
    }
}

impl Scheduler for DdgScheduler {
    fn add_action(&mut self, action: Box<dyn Action>) -> Result<ActionId, BuildError> {
        // Adding invalidates any previous build.
        self.graph = None;
        self.registry.add(action)
    }

    fn declare_external(&mut self, attr: AttrRef) {
        self.graph = None;
        self.registry.externals.insert(attr);
    }

    fn supply_external(&mut self, attr: AttrRef, value: AttrValue) -> Result<(), RoundError> {
        self.registry.supply_external(attr, value)
    }

    fn build(&mut self) -> Result<(), BuildError> {
        self.graph = Some(build_graph(
            &self.registry.actions,
            &self.registry.externals,
        )?);
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.graph.is_some()
    }

    fn len(&self) -> usize {
        self.registry.actions.len()
    }

    fn action_names(&self) -> Vec<String> {
        self.registry.names()
    }

    fn store(&self) -> &AttrStore {
        &self.registry.store
    }

    fn run_round(&mut self, clock: RoundClock) -> Result<RoundReport, RoundError> {
        let graph = self.graph.as_ref().ok_or(RoundError::NotBuilt)?;
        let actions = self.registry.actions.as_slice();
        let store = &self.registry.store;
        let n = actions.len();

        // Every declared-external read must have a value before the
        // round starts; failing fast here beats blocking a consumer
        // forever.
        for action in actions {
            for attr in action.reads() {
                if self.registry.externals.contains(&attr) && store.get(&attr).is_none() {
                    return Err(RoundError::External {
                        attr,
                        reason: "no value supplied this round".into(),
                    });
                }
            }
        }

        let round_start = Instant::now();
        let mut metrics = RoundMetrics::default();
        let mut deps = graph.dep_count.clone();
        let mut dispatched = vec![false; n];
        let mut claimed: IndexSet<AttrRef> = IndexSet::new();
        let mut staged: Vec<Option<IndexMap<AttrRef, AttrValue>>> = vec![None; n];
        let mut failure: Option<(String, ActionFailure)> = None;
        let mut in_flight = 0usize;
        let mut done = 0usize;

        let shared = RoundShared::new();
        let bound = self.config.max_concurrency;
        let sem = if bound > 0 {
            Some(Semaphore::new(bound as u64, bound as u64))
        } else {
            None
        };
        let workers = self.config.worker_count(n);
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();

        let outcome: Result<(), SyncError> = std::thread::scope(|s| {
            for _ in 0..workers {
                let rx = job_rx.clone();
                let shared_ref = &shared;
                let sem_ref = sem.as_ref();
                s.spawn(move || worker_loop(rx, shared_ref, actions, sem_ref));
            }
            drop(job_rx);

            loop {
                // Dispatch everything currently dispatchable within the
                // concurrency bound.
                while failure.is_none() {
                    let Some(i) = Self::pick_next(actions, &deps, &dispatched, &claimed)
                    else {
                        break;
                    };
                    if let Some(sem) = &sem {
                        if !sem.try_acquire()? {
                            break; // at the bound; wait for a completion
                        }
                    }
                    for attr in actions[i].writes() {
                        claimed.insert(attr);
                    }
                    dispatched[i] = true;
                    let inputs = Self::snapshot_inputs(actions[i].as_ref(), graph, &staged, store);
                    let ctx = RoundContext::new(
                        clock.round,
                        clock.time,
                        clock.dt,
                        inputs,
                        actions[i].writes(),
                    );
                    if send_job(&job_tx, Job { index: i, ctx }).is_err() {
                        return Err(SyncError::Poisoned);
                    }
                    in_flight += 1;
                    metrics.dispatched += 1;
                    metrics.max_in_flight = metrics.max_in_flight.max(in_flight as u64);
                }

                if done == n || (failure.is_some() && in_flight == 0) {
                    break;
                }
                if in_flight == 0 {
                    // Acyclic validated graph: some action is always
                    // dispatchable while work remains.
                    warn!("scheduler stalled with {done}/{n} actions complete");
                    shared.flag_abort()?;
                    break;
                }

                for completion in shared.next_completions()? {
                    in_flight -= 1;
                    let name = actions[completion.index].name().to_string();
                    match completion.result {
                        CompletionResult::Done(outputs) => {
                            metrics.action_us.push((name, completion.elapsed_us));
                            done += 1;
                            for attr in actions[completion.index].writes() {
                                claimed.swap_remove(&attr);
                            }
                            for &succ in &graph.succs[completion.index] {
                                deps[succ] -= 1;
                            }
                            staged[completion.index] = Some(outputs);
                        }
                        CompletionResult::Failed(e) => {
                            metrics.action_us.push((name.clone(), completion.elapsed_us));
                            if failure.is_none() {
                                failure = Some((name, ActionFailure(e)));
                                shared.flag_abort()?;
                            }
                        }
                        CompletionResult::Cancelled => {}
                    }
                }
            }

            drop(job_tx); // closes the channel; workers exit
            Ok(())
        });

        metrics.total_us = round_start.elapsed().as_micros() as u64;

        if let Err(e) = outcome {
            self.aborted_rounds += 1;
            metrics.aborted_rounds = self.aborted_rounds;
            self.last_metrics = metrics;
            return Err(RoundError::Sync(e));
        }

        if let Some((action, ActionFailure(source))) = failure {
            self.aborted_rounds += 1;
            metrics.aborted_rounds = self.aborted_rounds;
            self.last_metrics = metrics;
            warn!("round {} aborted: action '{action}' failed", clock.round);
            return Err(RoundError::ActionFailed { action, source });
        }

        if done != n {
            self.aborted_rounds += 1;
            metrics.aborted_rounds = self.aborted_rounds;
            self.last_metrics = metrics;
            return Err(RoundError::Cancelled);
        }

        // Publish staged outputs in registration order so the store's
        // layout is independent of completion interleaving.
        let mut produced = Vec::new();
        for stage in staged.into_iter().flatten() {
            for (attr, value) in stage {
                produced.push(attr.clone());
                self.registry.store.set(attr, value);
            }
        }

        metrics.aborted_rounds = self.aborted_rounds;
        self.last_metrics = metrics.clone();
        Ok(RoundReport {
            executed: n,
            produced,
            metrics,
        })
    }
}

/// Newtype so the failure slot has a name in match arms.
struct ActionFailure(tandem_core::ActionError);

fn send_job(tx: &Sender<Job>, job: Job) -> Result<(), ()> {
    tx.send(job).map_err(|_| {
        warn!("job channel closed early; workers are gone");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tandem_action::FnAction;
    use tandem_core::ActionError;

    fn attr(name: &str) -> AttrRef {
        AttrRef::new("t", name)
    }

    fn producer(name: &str, out: &str, value: Vec<f64>) -> Box<dyn Action> {
        let target = attr(out);
        let t2 = target.clone();
        Box::new(FnAction::new(name, vec![], vec![target], move |ctx| {
            ctx.set(t2.clone(), value.clone())
        }))
    }

    #[test]
    fn run_before_build_is_rejected() {
        let mut sched = DdgScheduler::default();
        sched.add_action(producer("a", "x", vec![1.0])).unwrap();
        assert_eq!(
            sched.run_round(RoundClock::zero()).unwrap_err(),
            RoundError::NotBuilt
        );
    }

    #[test]
    fn duplicate_action_name_is_rejected_at_registration() {
        let mut sched = DdgScheduler::default();
        sched.add_action(producer("a", "x", vec![1.0])).unwrap();
        let err = sched.add_action(producer("a", "y", vec![1.0])).unwrap_err();
        assert_eq!(err, BuildError::DuplicateAction { name: "a".into() });
    }

    #[test]
    fn chain_executes_in_dependency_order() {
        let mut sched = DdgScheduler::default();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let x = attr("x");
        let y = attr("y");
        let z = attr("z");

        // Register out of dependency order on purpose.
        for (name, reads, writes) in [
            ("c", vec![x.clone(), y.clone()], vec![z.clone()]),
            ("a", vec![], vec![x.clone()]),
            ("b", vec![x.clone()], vec![y.clone()]),
        ] {
            let log = Arc::clone(&order);
            let writes2 = writes.clone();
            sched
                .add_action(Box::new(FnAction::new(name, reads, writes, move |ctx| {
                    log.lock().unwrap().push(name.to_string());
                    for w in &writes2 {
                        ctx.set(w.clone(), vec![1.0])?;
                    }
                    Ok(())
                })))
                .unwrap();
        }

        sched.build().unwrap();
        let report = sched.run_round(RoundClock::zero()).unwrap();

        assert_eq!(report.executed, 3);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
        // Produced set covers all three attributes.
        let mut produced = report.produced.clone();
        produced.sort();
        let mut expected = vec![x, y, z];
        expected.sort();
        assert_eq!(produced, expected);
    }

    #[test]
    fn priority_breaks_ties_then_registration_order() {
        let mut sched = DdgScheduler::default();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for (name, priority) in [("first", 0), ("urgent", 10), ("second", 0)] {
            let log = Arc::clone(&order);
            let out = attr(name);
            let out2 = out.clone();
            sched
                .add_action(Box::new(
                    FnAction::new(name, vec![], vec![out], move |ctx| {
                        log.lock().unwrap().push(name.to_string());
                        ctx.set(out2.clone(), vec![0.0])
                    })
                    .with_priority(priority),
                ))
                .unwrap();
        }

        sched.build().unwrap();
        sched.run_round(RoundClock::zero()).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["urgent", "first", "second"]);
    }

    #[test]
    fn failure_aborts_remaining_dispatch() {
        let mut sched = DdgScheduler::default();
        let ran_downstream = Arc::new(AtomicUsize::new(0));

        let x = attr("x");
        sched
            .add_action(Box::new(FnAction::new(
                "bad",
                vec![],
                vec![x.clone()],
                |_| {
                    Err(ActionError::Failed {
                        reason: "solver diverged".into(),
                    })
                },
            )))
            .unwrap();

        let counter = Arc::clone(&ran_downstream);
        let y = attr("y");
        sched
            .add_action(Box::new(FnAction::new(
                "downstream",
                vec![x.clone()],
                vec![y],
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )))
            .unwrap();

        sched.build().unwrap();
        let err = sched.run_round(RoundClock::zero()).unwrap_err();
        assert_eq!(
            err,
            RoundError::ActionFailed {
                action: "bad".into(),
                source: ActionError::Failed {
                    reason: "solver diverged".into(),
                },
            }
        );
        assert_eq!(ran_downstream.load(Ordering::SeqCst), 0);
        // Failed round published nothing.
        assert!(sched.store().is_empty());
        assert_eq!(sched.last_metrics().aborted_rounds, 1);

        // The scheduler stays usable: a rebuilt config is not required.
        let err2 = sched.run_round(RoundClock::zero()).unwrap_err();
        assert!(matches!(err2, RoundError::ActionFailed { .. }));
    }

    #[test]
    fn disjoint_actions_commute() {
        let run = |flip: bool| {
            let mut sched = DdgScheduler::new(SchedulerConfig::concurrent(2));
            let (a, b) = (
                producer("a", "x", vec![1.0]),
                producer("b", "y", vec![2.0]),
            );
            if flip {
                sched.add_action(b).unwrap();
                sched.add_action(a).unwrap();
            } else {
                sched.add_action(a).unwrap();
                sched.add_action(b).unwrap();
            }
            sched.build().unwrap();
            sched.run_round(RoundClock::zero()).unwrap();
            let mut produced: Vec<String> =
                sched.store().iter().map(|(a, _)| a.to_string()).collect();
            produced.sort();
            (
                produced,
                sched.store().get(&attr("x")).unwrap().to_vec(),
                sched.store().get(&attr("y")).unwrap().to_vec(),
            )
        };

        assert_eq!(run(false), run(true));
    }

    #[test]
    fn external_attribute_gates_the_round() {
        let boundary = attr("boundary");
        let out = attr("out");

        let mut sched = DdgScheduler::default();
        sched.declare_external(boundary.clone());
        let (b2, o2) = (boundary.clone(), out.clone());
        sched
            .add_action(Box::new(FnAction::new(
                "consume",
                vec![boundary.clone()],
                vec![out.clone()],
                move |ctx| {
                    let v = ctx.get(&b2).unwrap_or(&[]).to_vec();
                    ctx.set(o2.clone(), v)
                },
            )))
            .unwrap();
        sched.build().unwrap();

        // Not supplied yet: the round fails fast.
        let err = sched.run_round(RoundClock::zero()).unwrap_err();
        assert!(matches!(err, RoundError::External { .. }));

        sched
            .supply_external(boundary.clone(), vec![3.5, 4.5])
            .unwrap();
        sched.run_round(RoundClock::zero()).unwrap();
        assert_eq!(sched.store().get(&out).unwrap(), &[3.5, 4.5]);
    }

    #[test]
    fn supply_undeclared_external_is_rejected() {
        let mut sched = DdgScheduler::default();
        let err = sched
            .supply_external(attr("mystery"), vec![1.0])
            .unwrap_err();
        assert!(matches!(err, RoundError::External { .. }));
    }

    #[test]
    fn concurrent_rounds_match_sequential_rounds() {
        let build = |config: SchedulerConfig| {
            let mut sched = DdgScheduler::new(config);
            let x = attr("x");
            let y = attr("y");
            let z = attr("z");
            sched.add_action(producer("a", "x", vec![2.0])).unwrap();
            let (x2, y2) = (x.clone(), y.clone());
            sched
                .add_action(Box::new(FnAction::new(
                    "b",
                    vec![x.clone()],
                    vec![y.clone()],
                    move |ctx| {
                        let v: Vec<f64> =
                            ctx.get(&x2).unwrap().iter().map(|v| v + 1.0).collect();
                        ctx.set(y2.clone(), v)
                    },
                )))
                .unwrap();
            let (x3, z3) = (x.clone(), z.clone());
            sched
                .add_action(Box::new(FnAction::new(
                    "c",
                    vec![x],
                    vec![z],
                    move |ctx| {
                        let v: Vec<f64> =
                            ctx.get(&x3).unwrap().iter().map(|v| v * 10.0).collect();
                        ctx.set(z3.clone(), v)
                    },
                )))
                .unwrap();
            sched.build().unwrap();
            sched.run_round(RoundClock::zero()).unwrap();
            (
                sched.store().get(&attr("y")).unwrap().to_vec(),
                sched.store().get(&attr("z")).unwrap().to_vec(),
            )
        };

        assert_eq!(
            build(SchedulerConfig::sequential()),
            build(SchedulerConfig::concurrent(0))
        );
    }
}
