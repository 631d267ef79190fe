//! Action trait and round execution context for Tandem couplings.
//!
//! An action is the smallest schedulable unit of work. It declares the
//! attributes it reads and writes at registration time; schedulers use
//! those declarations to validate the dependency graph and derive a
//! safe execution order. Two built-in action kinds carry no solver
//! computation: [`BarrierAction`] (a pure synchronization point) and
//! [`Interpolate`] (temporal interpolation between agents advancing at
//! different rates).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod action;
pub mod barrier;
pub mod context;
pub mod fn_action;
pub mod interpolate;

pub use action::Action;
pub use barrier::BarrierAction;
pub use context::RoundContext;
pub use fn_action::FnAction;
pub use interpolate::{new_series, Interpolate, SampleSeries, SeriesHandle};
