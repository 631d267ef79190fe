//! Dependency-graph and fixed-order schedulers for Tandem couplings.
//!
//! A [`Scheduler`] owns the actions of one agent and drives them once
//! per coupling round. Two implementations:
//!
//! - [`DdgScheduler`] derives a safe execution order from the data
//!   dependency graph implied by the actions' declared read/write sets,
//!   and may dispatch independent actions concurrently.
//! - [`UserScheduler`] executes an explicit, caller-supplied order with
//!   no inference.
//!
//! Both validate their configuration at [`build()`](Scheduler::build)
//! time — duplicate names, duplicate writers, undeclared attributes,
//! and dependency cycles are configuration errors that prevent any
//! action from executing.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod ddg;
mod graph;
pub mod metrics;
mod round;
pub mod scheduler;
pub mod user;

pub use config::SchedulerConfig;
pub use ddg::DdgScheduler;
pub use metrics::RoundMetrics;
pub use scheduler::{RoundClock, RoundReport, Scheduler};
pub use user::UserScheduler;
