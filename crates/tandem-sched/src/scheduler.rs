//! The [`Scheduler`] trait and the registration machinery shared by its
//! implementations.

use indexmap::{IndexMap, IndexSet};
use tandem_action::{Action, BarrierAction};
use tandem_core::{ActionId, AttrRef, AttrStore, AttrValue, BuildError, RoundError, RoundId};

use crate::metrics::RoundMetrics;

/// Clock information for one round: which round it is, the time the
/// round produces values for, and the owning agent's timestep.
#[derive(Clone, Copy, Debug)]
pub struct RoundClock {
    /// Monotonic round counter.
    pub round: RoundId,
    /// Target time of this round (the sub-step being produced).
    pub time: f64,
    /// The owning agent's local timestep.
    pub dt: f64,
}

impl RoundClock {
    /// Clock for round zero at t=0 with unit timestep — test shorthand.
    pub fn zero() -> Self {
        Self {
            round: RoundId(0),
            time: 0.0,
            dt: 1.0,
        }
    }
}

/// Result of a successful round.
#[derive(Clone, Debug, Default)]
pub struct RoundReport {
    /// Number of actions that executed.
    pub executed: usize,
    /// Attributes produced this round, in registration order of their
    /// writers.
    pub produced: Vec<AttrRef>,
    /// Timing and dispatch metrics for the round.
    pub metrics: RoundMetrics,
}

/// Owns one agent's actions; validates them and drives them one round
/// at a time.
///
/// Lifecycle: register actions (and external attributes), `build()`
/// once, then `run_round()` once per coupling round. A failed round
/// leaves the scheduler usable; a failed build does not.
pub trait Scheduler: Send {
    /// Register an action. Fails with [`BuildError::DuplicateAction`]
    /// when the name is already taken.
    fn add_action(&mut self, action: Box<dyn Action>) -> Result<ActionId, BuildError>;

    /// Register a synchronization barrier: every action registered
    /// before it completes before anything registered after it starts.
    fn add_barrier(&mut self, name: &str) -> Result<ActionId, BuildError> {
        self.add_action(Box::new(BarrierAction::new(name)))
    }

    /// Declare an attribute as produced outside this scheduler.
    ///
    /// Reads of a declared-external attribute are satisfied from the
    /// store at round start instead of requiring a sibling writer.
    fn declare_external(&mut self, attr: AttrRef);

    /// Supply the current value of a declared-external attribute.
    fn supply_external(&mut self, attr: AttrRef, value: AttrValue) -> Result<(), RoundError>;

    /// Validate the configuration and derive execution order.
    fn build(&mut self) -> Result<(), BuildError>;

    /// Whether `build()` has succeeded.
    fn is_built(&self) -> bool;

    /// Number of registered actions.
    fn len(&self) -> usize;

    /// Whether no actions are registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered action names, in registration order.
    fn action_names(&self) -> Vec<String>;

    /// Execute one round.
    fn run_round(&mut self, clock: RoundClock) -> Result<RoundReport, RoundError>;

    /// The scheduler's attribute store (merged outputs across rounds).
    fn store(&self) -> &AttrStore;
}

/// Registration state shared by both scheduler implementations.
pub(crate) struct Registry {
    pub(crate) actions: Vec<Box<dyn Action>>,
    pub(crate) by_name: IndexMap<String, usize>,
    pub(crate) externals: IndexSet<AttrRef>,
    pub(crate) store: AttrStore,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            actions: Vec::new(),
            by_name: IndexMap::new(),
            externals: IndexSet::new(),
            store: AttrStore::new(),
        }
    }

    pub(crate) fn add(&mut self, action: Box<dyn Action>) -> Result<ActionId, BuildError> {
        let name = action.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(BuildError::DuplicateAction { name });
        }
        let id = self.actions.len();
        self.by_name.insert(name, id);
        self.actions.push(action);
        Ok(ActionId(id))
    }

    pub(crate) fn supply_external(
        &mut self,
        attr: AttrRef,
        value: AttrValue,
    ) -> Result<(), RoundError> {
        if !self.externals.contains(&attr) {
            return Err(RoundError::External {
                attr,
                reason: "not declared external".into(),
            });
        }
        self.store.set(attr, value);
        Ok(())
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }
}
