//! Error types for the Tandem scheduling and coupling layer.
//!
//! One enum per failure domain, following the propagation contract:
//! action failure → scheduler marks the round failed and aborts remaining
//! dispatch → agent surfaces the round error → coupling aborts the round
//! for all agents without advancing global time. Sync-primitive failures
//! are returned as statuses at the call site and are never escalated
//! automatically.

use std::error::Error;
use std::fmt;

use crate::attr::AttrRef;

/// Errors from scheduler construction and validation.
///
/// All variants are detected at `build()` time and are fatal to that
/// scheduler; no action executes until the configuration is fixed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// Two actions were registered under the same name.
    DuplicateAction {
        /// The contested name.
        name: String,
    },
    /// Two actions of one scheduler declare the same write attribute.
    DuplicateWriter {
        /// The contested attribute.
        attr: AttrRef,
        /// Name of the first writer (earlier registration).
        first: String,
        /// Name of the second writer (later registration).
        second: String,
    },
    /// An action reads an attribute no sibling writes and that was not
    /// declared external.
    UndeclaredAttribute {
        /// The reading action.
        action: String,
        /// The unknown attribute.
        attr: AttrRef,
    },
    /// The dependency graph contains a cycle.
    CycleDetected {
        /// Action names along the cycle, in edge order.
        members: Vec<String>,
    },
    /// The scheduler has no actions registered.
    EmptyScheduler,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateAction { name } => {
                write!(f, "action '{name}' is already registered")
            }
            Self::DuplicateWriter {
                attr,
                first,
                second,
            } => {
                write!(
                    f,
                    "attribute {attr} written by both '{first}' and '{second}'"
                )
            }
            Self::UndeclaredAttribute { action, attr } => {
                write!(
                    f,
                    "action '{action}' reads {attr}, which has no writer and \
                     is not declared external"
                )
            }
            Self::CycleDetected { members } => {
                write!(f, "dependency cycle: {}", members.join(" -> "))
            }
            Self::EmptyScheduler => write!(f, "scheduler has no actions"),
        }
    }
}

impl Error for BuildError {}

/// Errors from an individual action's execution.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionError {
    /// The action's body failed.
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// An action produced a NaN or infinite value (sentinel checking).
    NonFinite {
        /// The attribute containing the non-finite value.
        attr: AttrRef,
    },
    /// The action wrote to (or read from) an attribute outside its
    /// declared sets.
    UndeclaredAccess {
        /// The out-of-contract attribute.
        attr: AttrRef,
    },
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "execution failed: {reason}"),
            Self::NonFinite { attr } => {
                write!(f, "non-finite value produced for {attr}")
            }
            Self::UndeclaredAccess { attr } => {
                write!(f, "access to undeclared attribute {attr}")
            }
        }
    }
}

impl Error for ActionError {}

/// Errors from one scheduler round.
///
/// A failed round leaves the scheduler usable: the next `run_round()`
/// starts from fresh round state.
#[derive(Clone, Debug, PartialEq)]
pub enum RoundError {
    /// An action failed; remaining dispatch was aborted.
    ActionFailed {
        /// Name of the failing action.
        action: String,
        /// The action's own failure detail, propagated unchanged.
        source: ActionError,
    },
    /// The round was cancelled by an abort broadcast before completion.
    Cancelled,
    /// `run_round()` was called before a successful `build()`.
    NotBuilt,
    /// A sync primitive failed while coordinating the round.
    Sync(SyncError),
    /// An externally supplied attribute could not be obtained.
    External {
        /// The attribute that was expected from outside.
        attr: AttrRef,
        /// Why it was unavailable.
        reason: String,
    },
}

impl fmt::Display for RoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActionFailed { action, source } => {
                write!(f, "action '{action}' failed: {source}")
            }
            Self::Cancelled => write!(f, "round cancelled"),
            Self::NotBuilt => write!(f, "scheduler has not been built"),
            Self::Sync(e) => write!(f, "sync primitive failure: {e}"),
            Self::External { attr, reason } => {
                write!(f, "external attribute {attr} unavailable: {reason}")
            }
        }
    }
}

impl Error for RoundError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ActionFailed { source, .. } => Some(source),
            Self::Sync(source) => Some(source),
            _ => None,
        }
    }
}

impl From<SyncError> for RoundError {
    fn from(e: SyncError) -> Self {
        Self::Sync(e)
    }
}

/// Errors from the sync primitives.
///
/// Returned as statuses at the call site; the caller decides fatality.
/// A primitive never silently succeeds on failure — ignoring one of
/// these risks an undetected deadlock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncError {
    /// `unlock()` was called by a thread that does not hold the lock.
    NotOwner,
    /// `lock()` was called by the thread that already holds the lock.
    WouldDeadlock,
    /// A thread panicked while holding the primitive's internal state.
    Poisoned,
    /// Semaphore counts were inconsistent (`initial > max` with a
    /// positive max).
    InvalidCount,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOwner => write!(f, "lock not owned by caller"),
            Self::WouldDeadlock => write!(f, "relock by owner would deadlock"),
            Self::Poisoned => write!(f, "primitive poisoned by a panic"),
            Self::InvalidCount => write!(f, "invalid semaphore count"),
        }
    }
}

impl Error for SyncError {}

/// Errors from local-clock reconciliation against a checkpoint.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeError {
    /// A timestep is NaN, infinite, zero, or negative.
    InvalidTimestep {
        /// The offending value.
        value: f64,
    },
    /// An agent cannot reach the checkpoint exactly with its timestep.
    UnreachableTarget {
        /// The agent whose clock cannot reconcile.
        agent: String,
        /// The agent's current local time.
        current: f64,
        /// The checkpoint it was asked to reach.
        target: f64,
        /// The agent's configured timestep.
        dt: f64,
    },
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimestep { value } => {
                write!(f, "timestep must be finite and positive, got {value}")
            }
            Self::UnreachableTarget {
                agent,
                current,
                target,
                dt,
            } => {
                write!(
                    f,
                    "agent '{agent}' at t={current} cannot reach t={target} \
                     with dt={dt}"
                )
            }
        }
    }
}

impl Error for TimeError {}

/// Errors from an external data channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// The peer closed the channel.
    Closed,
    /// An I/O-level failure, with the collaborator's description.
    Io {
        /// Description from the underlying transport.
        reason: String,
    },
    /// The received payload was not a whole number of f64 values.
    MalformedPayload,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "channel closed by peer"),
            Self::Io { reason } => write!(f, "channel I/O failure: {reason}"),
            Self::MalformedPayload => write!(f, "payload is not a whole number of f64 values"),
        }
    }
}

impl Error for ChannelError {}
