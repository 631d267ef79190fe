//! Core types and traits for the Tandem coupled-simulation framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Tandem workspace:
//! typed IDs, attribute references, time helpers, error types, and the
//! external-data-channel trait.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod attr;
pub mod error;
pub mod id;
pub mod time;
pub mod traits;

pub use attr::{AttrRef, AttrStore, AttrValue};
pub use error::{ActionError, BuildError, ChannelError, RoundError, SyncError, TimeError};
pub use id::{ActionId, AgentId, RoundId};
pub use time::{steps_to_reach, times_close, validate_timestep};
pub use traits::{decode_payload, ExternalChannel, Interest};
