//! User-ordered scheduler.
//!
//! [`UserScheduler`] trusts the caller's registration order instead of
//! deriving one from declared read/write sets. Actions run
//! sequentially, each seeing everything earlier actions merged into the
//! store. There is no conflict analysis and no rollback; the first
//! failure stops the round with earlier merges kept. This is the escape
//! hatch for action sets whose ordering constraints are not expressible
//! as data dependencies.

use std::time::Instant;

use log::warn;
use tandem_action::{Action, RoundContext};
use tandem_core::{ActionId, AttrRef, AttrStore, AttrValue, BuildError, RoundError};

use crate::metrics::RoundMetrics;
use crate::scheduler::{Registry, RoundClock, RoundReport, Scheduler};

/// Scheduler executing actions in exact registration order.
pub struct UserScheduler {
    registry: Registry,
    built: bool,
}

impl Default for UserScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl UserScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            built: false,
        }
    }

}

impl Scheduler for UserScheduler {
    fn add_action(&mut self, action: Box<dyn Action>) -> Result<ActionId, BuildError> {
        self.built = false;
        self.registry.add(action)
    }

    fn declare_external(&mut self, attr: AttrRef) {
        self.built = false;
        self.registry.externals.insert(attr);
    }

    fn supply_external(&mut self, attr: AttrRef, value: AttrValue) -> Result<(), RoundError> {
        self.registry.supply_external(attr, value)
    }

    /// Ordering is the caller's; only emptiness is checked here (name
    /// uniqueness is enforced at registration).
    fn build(&mut self) -> Result<(), BuildError> {
        if self.registry.actions.is_empty() {
            return Err(BuildError::EmptyScheduler);
        }
        self.built = true;
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.built
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
        if !self.built {
            return Err(RoundError::NotBuilt);
        }

        let round_start = Instant::now();
        let mut metrics = RoundMetrics::default();
        let mut produced = Vec::new();
        let mut executed = 0usize;

        for i in 0..self.registry.actions.len() {
            let action = &self.registry.actions[i];
            let name = action.name().to_string();
            let reads = action.reads();
            // Reads are cut from the store as earlier actions left it.
            let inputs = self.registry.store.snapshot_of(&reads);
            let mut ctx = RoundContext::new(clock.round, clock.time, clock.dt, inputs, action.writes());

            let start = Instant::now();
            let result = action.run(&mut ctx);
            metrics
                .action_us
                .push((name.clone(), start.elapsed().as_micros() as u64));
            metrics.dispatched += 1;
            metrics.max_in_flight = 1;

            if let Err(source) = result {
                // Earlier merges stay; there is no rollback here.
                metrics.total_us = round_start.elapsed().as_micros() as u64;
                warn!("round {} stopped: action '{name}' failed", clock.round);
                return Err(RoundError::ActionFailed {
                    action: name,
                    source,
                });
            }

            executed += 1;
            for (attr, value) in ctx.into_outputs() {
                produced.push(attr.clone());
                self.registry.store.set(attr, value);
            }
        }

        metrics.total_us = round_start.elapsed().as_micros() as u64;
        Ok(RoundReport {
            executed,
            produced,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tandem_action::FnAction;
    use tandem_core::ActionError;

    fn attr(name: &str) -> AttrRef {
        AttrRef::new("t", name)
    }

    #[test]
    fn executes_in_registration_order_regardless_of_reads() {
        let mut sched = UserScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        // "late" reads an attribute that "early" writes, but is
        // registered first; user order wins, so the read sees nothing.
        let seen = Arc::new(Mutex::new(None));
        let (x, x2) = (attr("x"), attr("x"));
        let log = Arc::clone(&order);
        let seen2 = Arc::clone(&seen);
        sched
            .add_action(Box::new(FnAction::new(
                "late",
                vec![x.clone()],
                vec![],
                move |ctx| {
                    log.lock().unwrap().push("late");
                    *seen2.lock().unwrap() = ctx.get(&x2).map(<[f64]>::to_vec);
                    Ok(())
                },
            )))
            .unwrap();

        let log = Arc::clone(&order);
        let x3 = x.clone();
        sched
            .add_action(Box::new(FnAction::new("early", vec![], vec![x], move |ctx| {
                log.lock().unwrap().push("early");
                ctx.set(x3.clone(), vec![9.0])
            })))
            .unwrap();

        sched.build().unwrap();
        sched.run_round(RoundClock::zero()).unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["late", "early"]);
        assert_eq!(*seen.lock().unwrap(), None);
    }

    #[test]
    fn later_actions_see_earlier_outputs() {
        let mut sched = UserScheduler::new();
        let (x, y) = (attr("x"), attr("y"));

        let x2 = x.clone();
        sched
            .add_action(Box::new(FnAction::new("a", vec![], vec![x.clone()], move |ctx| {
                ctx.set(x2.clone(), vec![2.0])
            })))
            .unwrap();
        let (x3, y2) = (x.clone(), y.clone());
        sched
            .add_action(Box::new(FnAction::new("b", vec![x], vec![y.clone()], move |ctx| {
                let doubled: Vec<f64> = ctx.get(&x3).unwrap().iter().map(|v| v * 2.0).collect();
                ctx.set(y2.clone(), doubled)
            })))
            .unwrap();

        sched.build().unwrap();
        sched.run_round(RoundClock::zero()).unwrap();
        assert_eq!(sched.store().get(&y).unwrap(), &[4.0]);
    }

    #[test]
    fn failure_keeps_earlier_merges() {
        let mut sched = UserScheduler::new();
        let x = attr("x");

        let x2 = x.clone();
        sched
            .add_action(Box::new(FnAction::new("ok", vec![], vec![x.clone()], move |ctx| {
                ctx.set(x2.clone(), vec![1.0])
            })))
            .unwrap();
        sched
            .add_action(Box::new(FnAction::new("bad", vec![], vec![], |_| {
                Err(ActionError::Failed {
                    reason: "boundary mismatch".into(),
                })
            })))
            .unwrap();

        sched.build().unwrap();
        let err = sched.run_round(RoundClock::zero()).unwrap_err();
        assert!(matches!(err, RoundError::ActionFailed { ref action, .. } if action == "bad"));
        // The first action's output was already merged.
        assert_eq!(sched.store().get(&x).unwrap(), &[1.0]);
    }

    #[test]
    fn empty_build_is_rejected() {
        let mut sched = UserScheduler::new();
        assert_eq!(sched.build().unwrap_err(), BuildError::EmptyScheduler);
        assert!(!sched.is_built());
    }
}
