//! Agent lifecycle and multi-rate coupling orchestration.
//!
//! An [`Agent`] wraps one scheduler with a local clock; a [`Coupling`]
//! drives a set of agents toward common checkpoints, exchanging linked
//! attributes through interpolated sample series and feeding externally
//! supplied attributes from channels.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod coupling;
pub mod error;
mod external;

pub use agent::{Agent, AgentState};
pub use coupling::{Coupling, CouplingConfig, CouplingState};
pub use error::CouplingError;
