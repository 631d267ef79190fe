//! Control-only barrier action.

use tandem_core::{ActionError, AttrRef};

use crate::action::Action;
use crate::context::RoundContext;

/// An action whose sole effect is to act as a synchronization point.
///
/// The graph builder sequences a barrier after every action registered
/// before it and before every action registered after it, guaranteeing
/// that everything on the earlier side has completed before anything on
/// the later side starts. The coupling inserts one between cross-agent
/// producers and consumers to pin down visibility ordering.
#[derive(Debug)]
pub struct BarrierAction {
    name: String,
}

impl BarrierAction {
    /// Create a barrier with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Action for BarrierAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> Vec<AttrRef> {
        Vec::new()
    }

    fn writes(&self) -> Vec<AttrRef> {
        Vec::new()
    }

    fn is_barrier(&self) -> bool {
        true
    }

    fn run(&self, _ctx: &mut RoundContext) -> Result<(), ActionError> {
        Ok(())
    }
}
