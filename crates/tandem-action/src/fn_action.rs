//! Closure adapter for leaf actions.
//!
//! Solver wrappers and tests rarely need a dedicated type per action;
//! [`FnAction`] pairs a closure with its declared read/write sets.

use tandem_core::{ActionError, AttrRef};

use crate::action::Action;
use crate::context::RoundContext;

/// An [`Action`] built from a closure and explicit declarations.
///
/// ```
/// use tandem_action::FnAction;
/// use tandem_core::AttrRef;
///
/// let x = AttrRef::new("fluid", "x");
/// let produce_x = FnAction::new("produce_x", vec![], vec![x.clone()], move |ctx| {
///     ctx.set(x.clone(), vec![1.0, 2.0, 3.0])
/// });
/// ```
pub struct FnAction<F> {
    name: String,
    priority: i32,
    reads: Vec<AttrRef>,
    writes: Vec<AttrRef>,
    body: F,
}

impl<F> FnAction<F>
where
    F: Fn(&mut RoundContext) -> Result<(), ActionError> + Send + Sync,
{
    /// Create an action from declared sets and a body.
    pub fn new(
        name: impl Into<String>,
        reads: Vec<AttrRef>,
        writes: Vec<AttrRef>,
        body: F,
    ) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            reads,
            writes,
            body,
        }
    }

    /// Override the tie-break priority (default 0).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl<F> Action for FnAction<F>
where
    F: Fn(&mut RoundContext) -> Result<(), ActionError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn reads(&self) -> Vec<AttrRef> {
        self.reads.clone()
    }

    fn writes(&self) -> Vec<AttrRef> {
        self.writes.clone()
    }

    fn run(&self, ctx: &mut RoundContext) -> Result<(), ActionError> {
        (self.body)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use tandem_core::RoundId;

    #[test]
    fn closure_body_runs_with_declared_sets() {
        let x = AttrRef::new("a", "x");
        let y = AttrRef::new("a", "y");

        let x2 = x.clone();
        let y2 = y.clone();
        let act = FnAction::new("copy", vec![x.clone()], vec![y.clone()], move |ctx| {
            let v = ctx
                .get(&x2)
                .ok_or_else(|| ActionError::Failed {
                    reason: "x missing".into(),
                })?
                .to_vec();
            ctx.set(y2.clone(), v)
        })
        .with_priority(5);

        assert_eq!(act.name(), "copy");
        assert_eq!(act.priority(), 5);
        assert_eq!(act.reads(), vec![x.clone()]);
        assert_eq!(act.writes(), vec![y.clone()]);

        let mut inputs = IndexMap::new();
        inputs.insert(x, vec![9.0]);
        let mut ctx = RoundContext::new(RoundId(0), 1.0, 1.0, inputs, vec![y.clone()]);
        act.run(&mut ctx).unwrap();
        assert_eq!(ctx.into_outputs()[&y], vec![9.0]);
    }
}
