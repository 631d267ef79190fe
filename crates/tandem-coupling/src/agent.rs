//! One participant in a coupling.
//!
//! An [`Agent`] owns a scheduler and a local clock. It advances by
//! running whole local rounds of its own timestep until its clock meets
//! a checkpoint exactly; a checkpoint that is not a whole number of
//! timesteps away is refused before any round runs.

use log::{debug, warn};
use tandem_core::{steps_to_reach, validate_timestep, AttrRef, AttrValue, RoundId, TimeError};
use tandem_sched::{RoundClock, Scheduler};

use crate::error::CouplingError;

/// Lifecycle state of an [`Agent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentState {
    /// Constructed; scheduler not yet built.
    Uninitialized,
    /// Scheduler built; no round has run.
    Initialized,
    /// At least one round has run.
    Running,
    /// Finalized; no further rounds may run.
    Finalized,
}

impl AgentState {
    fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Finalized => "finalized",
        }
    }
}

/// A named scheduler with a local clock.
///
/// The scheduler slot is emptied by [`finalize`](Agent::finalize); a
/// finalized agent holds no scheduler resources.
pub struct Agent {
    name: String,
    scheduler: Option<Box<dyn Scheduler>>,
    time: f64,
    dt: f64,
    round: RoundId,
    state: AgentState,
}

impl Agent {
    /// Create an agent advancing in steps of `dt`, starting at t=0.
    pub fn new(
        name: impl Into<String>,
        dt: f64,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<Self, TimeError> {
        validate_timestep(dt)?;
        Ok(Self {
            name: name.into(),
            scheduler: Some(scheduler),
            time: 0.0,
            dt,
            round: RoundId::default(),
            state: AgentState::Uninitialized,
        })
    }

    /// The agent's name, unique within its coupling.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current local time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Local timestep.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// The agent's scheduler. `None` once the agent is finalized.
    pub fn scheduler(&self) -> Option<&dyn Scheduler> {
        self.scheduler.as_deref()
    }

    /// Mutable access to the scheduler, for registering actions and
    /// supplying external attributes. `None` once the agent is
    /// finalized.
    ///
    /// Registering after `init()` invalidates the build; the coupling
    /// rebuilds before the next round.
    pub fn scheduler_mut(&mut self) -> Option<&mut (dyn Scheduler + 'static)> {
        self.scheduler.as_deref_mut()
    }

    /// Build the scheduler and enter `Initialized`.
    pub fn init(&mut self) -> Result<(), CouplingError> {
        if self.state != AgentState::Uninitialized {
            return Err(self.invalid_state("init"));
        }
        let Some(scheduler) = self.scheduler.as_mut() else {
            return Err(self.invalid_state("init"));
        };
        scheduler.build().map_err(|source| CouplingError::Build {
            agent: self.name.clone(),
            source,
        })?;
        self.state = AgentState::Initialized;
        debug!("agent '{}' initialized with dt={}", self.name, self.dt);
        Ok(())
    }

    /// Bring the agent to a runnable state: initialize if needed, and
    /// rebuild a scheduler invalidated by late registration.
    pub(crate) fn make_ready(&mut self) -> Result<(), CouplingError> {
        match self.state {
            AgentState::Uninitialized => self.init(),
            AgentState::Finalized => Err(self.invalid_state("run")),
            _ => {
                let Some(scheduler) = self.scheduler.as_mut() else {
                    return Err(self.invalid_state("run"));
                };
                if scheduler.is_built() {
                    Ok(())
                } else {
                    scheduler.build().map_err(|source| CouplingError::Build {
                        agent: self.name.clone(),
                        source,
                    })
                }
            }
        }
    }

    /// Feed an externally-produced value into the scheduler's store.
    pub(crate) fn supply_external(
        &mut self,
        attr: AttrRef,
        value: AttrValue,
    ) -> Result<(), CouplingError> {
        let Some(scheduler) = self.scheduler.as_mut() else {
            return Err(self.invalid_state("supply an external attribute"));
        };
        scheduler
            .supply_external(attr, value)
            .map_err(|source| CouplingError::Round {
                agent: self.name.clone(),
                source,
            })
    }

    /// Advance local time to `target` by running whole rounds of `dt`.
    ///
    /// Refused up front when `target` is behind the local clock or not
    /// a whole number of timesteps ahead (within tolerance). A failed
    /// round leaves local time at the last completed sub-step; the next
    /// `advance()` to the same target resumes from there.
    pub fn advance(&mut self, target: f64) -> Result<(), CouplingError> {
        match self.state {
            AgentState::Initialized | AgentState::Running => {}
            _ => return Err(self.invalid_state("advance")),
        }

        let Some(steps) = steps_to_reach(self.time, target, self.dt) else {
            return Err(CouplingError::Time(TimeError::UnreachableTarget {
                agent: self.name.clone(),
                current: self.time,
                target,
                dt: self.dt,
            }));
        };
        let Some(scheduler) = self.scheduler.as_mut() else {
            return Err(CouplingError::InvalidState {
                what: format!("agent '{}'", self.name),
                operation: "advance",
                state: AgentState::Finalized.label(),
            });
        };
        self.state = AgentState::Running;

        for k in 0..steps {
            // Pin the final sub-step to the checkpoint so accumulated
            // float error never drifts the clock off the round boundary.
            let t = if k + 1 == steps {
                target
            } else {
                self.time + self.dt
            };
            let clock = RoundClock {
                round: self.round,
                time: t,
                dt: self.dt,
            };
            if let Err(source) = scheduler.run_round(clock) {
                warn!(
                    "agent '{}' failed at t={t} (round {}): {source}",
                    self.name, self.round
                );
                return Err(CouplingError::Round {
                    agent: self.name.clone(),
                    source,
                });
            }
            self.time = t;
            self.round = self.round.next();
        }
        Ok(())
    }

    /// Finalize the agent. Idempotent, and callable from any state so a
    /// coupling can tear down after a failure.
    ///
    /// Drops the scheduler, releasing its store, staged state, and any
    /// worker resources; the slot stays empty afterwards.
    pub fn finalize(&mut self) -> Result<(), CouplingError> {
        if self.state == AgentState::Finalized {
            return Ok(());
        }
        debug!(
            "agent '{}' finalized at t={} after {} rounds",
            self.name, self.time, self.round
        );
        self.scheduler = None;
        self.state = AgentState::Finalized;
        Ok(())
    }

    fn invalid_state(&self, operation: &'static str) -> CouplingError {
        CouplingError::InvalidState {
            what: format!("agent '{}'", self.name),
            operation,
            state: self.state.label(),
        }
    }
}
