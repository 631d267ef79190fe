//! The [`Action`] trait.

use tandem_core::{ActionError, AttrRef};

use crate::context::RoundContext;

/// The smallest schedulable unit of work in a coupling.
///
/// # Contract
///
/// - `run()` MUST be deterministic: identical inputs produce identical
///   outputs. Coupling reproducibility depends on it.
/// - `&self` — actions are stateless between rounds; mutable state
///   flows through attributes.
/// - `reads()` and `writes()` are called once at `build()`, not per
///   round, and must not change afterwards.
/// - `run()` reads only attributes in its declared read-set (supplied
///   through the context snapshot) and writes only attributes in its
///   declared write-set (the context rejects anything else).
///
/// # Object safety
///
/// This trait is object-safe; schedulers store actions as
/// `Vec<Box<dyn Action>>`. `Sync` is required because a round may hand
/// `&dyn Action` to a worker thread.
///
/// # Examples
///
/// An action that doubles its input attribute:
///
/// ```
/// use tandem_action::{Action, RoundContext};
/// use tandem_core::{ActionError, AttrRef};
///
/// struct Doubler {
///     input: AttrRef,
///     output: AttrRef,
/// }
///
/// impl Action for Doubler {
///     fn name(&self) -> &str { "doubler" }
///
///     fn reads(&self) -> Vec<AttrRef> { vec![self.input.clone()] }
///
///     fn writes(&self) -> Vec<AttrRef> { vec![self.output.clone()] }
///
///     fn run(&self, ctx: &mut RoundContext) -> Result<(), ActionError> {
///         let doubled: Vec<f64> = ctx
///             .get(&self.input)
///             .ok_or_else(|| ActionError::Failed { reason: "input missing".into() })?
///             .iter()
///             .map(|v| v * 2.0)
///             .collect();
///         ctx.set(self.output.clone(), doubled)
///     }
/// }
/// ```
pub trait Action: Send + Sync {
    /// Name, unique within the owning scheduler. Used for error
    /// reporting and tie-breaking.
    fn name(&self) -> &str;

    /// Tie-break priority among simultaneously-ready actions: higher
    /// runs first, then registration order. Default 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Attributes this action reads. Each must be written by a sibling
    /// action or declared external to the scheduler.
    fn reads(&self) -> Vec<AttrRef>;

    /// Attributes this action writes. At most one writer per attribute
    /// within a scheduler.
    fn writes(&self) -> Vec<AttrRef>;

    /// Whether this is a pure synchronization point: the graph builder
    /// sequences a barrier after every earlier-registered action and
    /// before every later-registered one.
    fn is_barrier(&self) -> bool {
        false
    }

    /// Execute one round's worth of work.
    fn run(&self, ctx: &mut RoundContext) -> Result<(), ActionError>;
}
