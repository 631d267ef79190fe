//! Tandem: coupled-simulation orchestration.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all Tandem sub-crates. For most users, adding `tandem` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use tandem::prelude::*;
//!
//! // A producer agent emitting one attribute each sub-step.
//! let mut fluid_sched = DdgScheduler::default();
//! let flux = AttrRef::new("fluid", "flux");
//! let target = flux.clone();
//! fluid_sched
//!     .add_action(Box::new(FnAction::new(
//!         "produce_flux",
//!         vec![],
//!         vec![flux.clone()],
//!         move |ctx| ctx.set(target.clone(), vec![ctx.time()]),
//!     )))
//!     .unwrap();
//!
//! // A consumer agent; the link below registers its receive side.
//! let solid_sched = DdgScheduler::default();
//!
//! let mut coupling = Coupling::new();
//! coupling
//!     .add_agent(Agent::new("fluid", 0.5, Box::new(fluid_sched)).unwrap())
//!     .unwrap();
//! coupling
//!     .add_agent(Agent::new("solid", 1.0, Box::new(solid_sched)).unwrap())
//!     .unwrap();
//! coupling.link("fluid", flux, "solid").unwrap();
//!
//! coupling.run_to_time(2.0).unwrap();
//! assert_eq!(coupling.time(), 2.0);
//! assert_eq!(coupling.agent("solid").unwrap().time(), 2.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tandem-core` | IDs, attribute references, errors, the external-channel trait |
//! | [`sync`] | `tandem-sync` | Fail-closed mutex, condition variable, and semaphore |
//! | [`action`] | `tandem-action` | Action trait, round context, barriers, interpolation |
//! | [`sched`] | `tandem-sched` | Dependency-graph and fixed-order schedulers |
//! | [`coupling`] | `tandem-coupling` | Agent lifecycle and multi-rate coupling orchestration |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, IDs, and errors (`tandem-core`).
///
/// Contains [`types::AttrRef`], the error enums, time tolerance
/// helpers, and the [`types::ExternalChannel`] trait.
pub use tandem_core as types;

/// Fail-closed synchronization primitives (`tandem-sync`).
///
/// [`sync::Mutex`], [`sync::Condition`], and [`sync::Semaphore`] return
/// statuses instead of deadlocking or corrupting state on misuse.
pub use tandem_sync as sync;

/// Action trait and round execution context (`tandem-action`).
///
/// The [`action::Action`] trait is the main extension point for
/// user-defined coupling logic.
pub use tandem_action as action;

/// Schedulers (`tandem-sched`).
///
/// [`sched::DdgScheduler`] derives execution order from declared
/// read/write sets; [`sched::UserScheduler`] trusts registration order.
pub use tandem_sched as sched;

/// Agent lifecycle and coupling orchestration (`tandem-coupling`).
///
/// [`coupling::Coupling`] drives a set of [`coupling::Agent`]s toward
/// common checkpoints.
pub use tandem_coupling as coupling;

/// Common imports for typical Tandem usage.
///
/// ```rust
/// use tandem::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use tandem_core::{ActionId, AttrRef, AttrStore, AttrValue, RoundId};

    // Errors
    pub use tandem_core::{
        ActionError, BuildError, ChannelError, RoundError, SyncError, TimeError,
    };

    // External channels
    pub use tandem_core::{ExternalChannel, Interest};

    // Actions
    pub use tandem_action::{
        new_series, Action, BarrierAction, FnAction, Interpolate, RoundContext, SampleSeries,
        SeriesHandle,
    };

    // Schedulers
    pub use tandem_sched::{
        DdgScheduler, RoundClock, RoundMetrics, RoundReport, Scheduler, SchedulerConfig,
        UserScheduler,
    };

    // Coupling
    pub use tandem_coupling::{
        Agent, AgentState, Coupling, CouplingConfig, CouplingError, CouplingState,
    };
}
