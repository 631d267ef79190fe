//! Strongly-typed identifiers for actions, agents, and coupling rounds.

use std::fmt;

/// Identifies an action within one scheduler.
///
/// Actions are registered at configuration time and assigned sequential
/// IDs. `ActionId(n)` is the index of the n-th registered action in the
/// scheduler's action arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub usize);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for ActionId {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Identifies an agent within a coupling.
///
/// Assigned in registration order by the coupling; stable for the life
/// of the coupling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for AgentId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Monotonically increasing round counter.
///
/// Incremented each time a scheduler completes a round, and by the
/// coupling each time the global clock reaches a checkpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundId(pub u64);

impl RoundId {
    /// The round ID after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
