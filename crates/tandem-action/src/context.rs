//! Execution context passed to actions during a round.
//!
//! [`RoundContext`] is a snapshot-in / stage-out container: the
//! scheduler cuts a copy of the action's produced read-set before
//! dispatch and merges the staged outputs back into its store after a
//! successful run. A consumer therefore never observes a partially
//! written attribute, and concurrent actions never alias each other's
//! buffers.

use indexmap::IndexMap;
use tandem_core::{ActionError, AttrRef, AttrValue, RoundId};

/// Execution context for one action invocation.
pub struct RoundContext {
    round: RoundId,
    time: f64,
    dt: f64,
    inputs: IndexMap<AttrRef, AttrValue>,
    outputs: IndexMap<AttrRef, AttrValue>,
    declared_writes: Vec<AttrRef>,
}

impl RoundContext {
    /// Construct a context for one dispatch.
    ///
    /// Typically called by the scheduler; tests construct one directly
    /// with a hand-built input snapshot.
    pub fn new(
        round: RoundId,
        time: f64,
        dt: f64,
        inputs: IndexMap<AttrRef, AttrValue>,
        declared_writes: Vec<AttrRef>,
    ) -> Self {
        Self {
            round,
            time,
            dt,
            inputs,
            outputs: IndexMap::new(),
            declared_writes,
        }
    }

    /// Value of an attribute from the produced read-set snapshot.
    ///
    /// `None` when the attribute is outside the action's declared
    /// read-set or was never produced.
    pub fn get(&self, attr: &AttrRef) -> Option<&[f64]> {
        self.inputs.get(attr).map(Vec::as_slice)
    }

    /// Stage an output value for an attribute in the declared write-set.
    ///
    /// Writing outside the declared set fails with
    /// [`ActionError::UndeclaredAccess`]; nothing is staged in that case.
    pub fn set(&mut self, attr: AttrRef, value: AttrValue) -> Result<(), ActionError> {
        if !self.declared_writes.contains(&attr) {
            return Err(ActionError::UndeclaredAccess { attr });
        }
        self.outputs.insert(attr, value);
        Ok(())
    }

    /// The round being executed.
    pub fn round(&self) -> RoundId {
        self.round
    }

    /// The time this round produces values for (the sub-step target).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The owning agent's local timestep.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Consume the context, yielding the staged outputs for merging.
    pub fn into_outputs(self) -> IndexMap<AttrRef, AttrValue> {
        self.outputs
    }
}
