//! Coupling-layer errors.

use std::error::Error;
use std::fmt;

use tandem_core::{AttrRef, BuildError, RoundError, TimeError};

/// Errors from assembling and driving a coupling.
#[derive(Clone, Debug, PartialEq)]
pub enum CouplingError {
    /// Two agents were registered under the same name.
    DuplicateAgent {
        /// The contested name.
        name: String,
    },
    /// A link or attachment names an agent that is not registered.
    UnknownAgent {
        /// The unknown name.
        name: String,
    },
    /// A link names the same agent as producer and consumer.
    SelfLink {
        /// The agent on both ends.
        agent: String,
    },
    /// An agent's scheduler failed validation at `init()`.
    Build {
        /// The agent whose scheduler failed.
        agent: String,
        /// The underlying build failure.
        source: BuildError,
    },
    /// An agent's round failed; the coupling round was aborted and
    /// global time did not move.
    Round {
        /// The agent whose round failed.
        agent: String,
        /// The underlying round failure.
        source: RoundError,
    },
    /// A clock could not be reconciled against a checkpoint.
    Time(TimeError),
    /// An operation was called in the wrong lifecycle state.
    InvalidState {
        /// What was in the wrong state ("coupling" or "agent '...'").
        what: String,
        /// The attempted operation.
        operation: &'static str,
        /// The state it was in.
        state: &'static str,
    },
    /// A producer reached a checkpoint without a value for a linked
    /// attribute in its store.
    MissingLinkValue {
        /// The producer agent.
        agent: String,
        /// The linked attribute never produced.
        attr: AttrRef,
    },
    /// One or more agents failed to finalize. Every agent was still
    /// finalized; the failures are collected here.
    Finalize {
        /// `(agent, description)` per failure, in finalize order.
        failures: Vec<(String, String)>,
    },
}

impl fmt::Display for CouplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateAgent { name } => {
                write!(f, "agent '{name}' is already registered")
            }
            Self::UnknownAgent { name } => write!(f, "no agent named '{name}'"),
            Self::SelfLink { agent } => {
                write!(f, "agent '{agent}' cannot be linked to itself")
            }
            Self::Build { agent, source } => {
                write!(f, "agent '{agent}' failed to build: {source}")
            }
            Self::Round { agent, source } => {
                write!(f, "agent '{agent}' round failed: {source}")
            }
            Self::Time(e) => write!(f, "{e}"),
            Self::InvalidState {
                what,
                operation,
                state,
            } => {
                write!(f, "{what} cannot {operation} while {state}")
            }
            Self::MissingLinkValue { agent, attr } => {
                write!(
                    f,
                    "agent '{agent}' reached a checkpoint without producing linked \
                     attribute {attr}"
                )
            }
            Self::Finalize { failures } => {
                write!(f, "{} agent(s) failed to finalize:", failures.len())?;
                for (agent, reason) in failures {
                    write!(f, " [{agent}: {reason}]")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for CouplingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Build { source, .. } => Some(source),
            Self::Round { source, .. } => Some(source),
            Self::Time(source) => Some(source),
            _ => None,
        }
    }
}

impl From<TimeError> for CouplingError {
    fn from(e: TimeError) -> Self {
        Self::Time(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_error_chains_its_source() {
        let e = CouplingError::Round {
            agent: "fluid".into(),
            source: RoundError::Cancelled,
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("fluid"));
    }

    #[test]
    fn finalize_lists_every_failure() {
        let e = CouplingError::Finalize {
            failures: vec![
                ("fluid".into(), "channel refused to close".into()),
                ("solid".into(), "still running".into()),
            ],
        };
        let s = e.to_string();
        assert!(s.contains("2 agent(s)"));
        assert!(s.contains("fluid") && s.contains("solid"));
    }
}
