//! Orchestration of multiple agents advancing at different rates.
//!
//! A [`Coupling`] drives its agents in lockstep rounds of one
//! checkpoint width (the largest agent timestep unless overridden).
//! Each round every agent advances its local clock to the checkpoint,
//! producers before consumers; after a producer arrives, its linked
//! attributes are appended to the shared sample series that the
//! consumer-side [`Interpolate`] actions read. A failed agent aborts
//! the round for everyone and global time does not move.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, warn};
use tandem_action::{new_series, Interpolate, SeriesHandle};
use tandem_core::{
    times_close, validate_timestep, AgentId, AttrRef, ExternalChannel, RoundError, SyncError,
    TimeError,
};

use crate::agent::Agent;
use crate::error::CouplingError;
use crate::external::ExternalFeed;

/// Tuning knobs for a [`Coupling`].
#[derive(Clone, Debug, Default)]
pub struct CouplingConfig {
    /// Checkpoint width override. `None` derives it as the largest
    /// agent timestep.
    pub checkpoint_dt: Option<f64>,
}

/// Lifecycle state of a [`Coupling`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CouplingState {
    /// Agents and links may still be registered.
    Assembled,
    /// At least one round has started; the registry is frozen.
    Running,
    /// Finalized; no further rounds may run.
    Finalized,
}

impl CouplingState {
    fn label(self) -> &'static str {
        match self {
            Self::Assembled => "assembled",
            Self::Running => "running",
            Self::Finalized => "finalized",
        }
    }
}

/// One cross-agent data exchange.
struct Link {
    producer: String,
    attr: AttrRef,
    consumer: String,
    series: SeriesHandle,
}

/// A set of agents advancing together toward common checkpoints.
pub struct Coupling {
    agents: IndexMap<String, Agent>,
    links: Vec<Link>,
    feeds: Vec<ExternalFeed>,
    config: CouplingConfig,
    time: f64,
    rounds: u64,
    state: CouplingState,
}

impl Default for Coupling {
    fn default() -> Self {
        Self::new()
    }
}

impl Coupling {
    /// Create an empty coupling with default configuration.
    pub fn new() -> Self {
        Self::with_config(CouplingConfig::default())
    }

    /// Create an empty coupling with the given configuration.
    pub fn with_config(config: CouplingConfig) -> Self {
        Self {
            agents: IndexMap::new(),
            links: Vec::new(),
            feeds: Vec::new(),
            config,
            time: 0.0,
            rounds: 0,
            state: CouplingState::Assembled,
        }
    }

    /// Current global time. Moves only at successful round boundaries.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed coupling rounds.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CouplingState {
        self.state
    }

    /// Look up an agent by name.
    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    /// Mutable access to an agent, for supplying external attributes or
    /// inspecting its scheduler.
    pub fn agent_mut(&mut self, name: &str) -> Option<&mut Agent> {
        self.agents.get_mut(name)
    }

    /// Registered agent names, in registration order.
    pub fn agent_names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    /// Register an agent, returning its registration-order ID. Only
    /// while assembled; duplicate names are rejected.
    pub fn add_agent(&mut self, agent: Agent) -> Result<AgentId, CouplingError> {
        self.check_assembled("add an agent")?;
        let name = agent.name().to_string();
        if self.agents.contains_key(&name) {
            return Err(CouplingError::DuplicateAgent { name });
        }
        let id = AgentId(self.agents.len() as u32);
        self.agents.insert(name, agent);
        Ok(id)
    }

    /// Declare that `consumer` consumes `producer`'s attribute `attr`.
    ///
    /// Registers an [`Interpolate`] in the consumer's scheduler writing
    /// `<consumer>.<name>_in`, preceded by a barrier so every earlier
    /// consumer-side action completes before cross-agent data is read.
    /// Producer-side, the coupling appends the attribute's value to the
    /// shared series at every checkpoint the producer reaches.
    ///
    /// Returns the consumer-side attribute the interpolation writes.
    pub fn link(
        &mut self,
        producer: &str,
        attr: AttrRef,
        consumer: &str,
    ) -> Result<AttrRef, CouplingError> {
        self.check_assembled("add a link")?;
        if producer == consumer {
            return Err(CouplingError::SelfLink {
                agent: producer.to_string(),
            });
        }
        if !self.agents.contains_key(producer) {
            return Err(CouplingError::UnknownAgent {
                name: producer.to_string(),
            });
        }
        let Some(consumer_agent) = self.agents.get_mut(consumer) else {
            return Err(CouplingError::UnknownAgent {
                name: consumer.to_string(),
            });
        };

        let series = new_series();
        let target = AttrRef::new(consumer, format!("{}_in", attr.name));
        let build_err = |source| CouplingError::Build {
            agent: consumer.to_string(),
            source,
        };

        let Some(sched) = consumer_agent.scheduler_mut() else {
            return Err(CouplingError::InvalidState {
                what: format!("agent '{consumer}'"),
                operation: "add a link",
                state: "finalized",
            });
        };
        sched
            .add_barrier(&format!("{}_{}_sync", producer, attr.name))
            .map_err(build_err)?;
        sched
            .add_action(Box::new(Interpolate::new(
                format!("{}_{}_recv", producer, attr.name),
                Arc::clone(&series),
                target.clone(),
            )))
            .map_err(build_err)?;

        self.links.push(Link {
            producer: producer.to_string(),
            attr,
            consumer: consumer.to_string(),
            series,
        });
        Ok(target)
    }

    /// Bind one of `agent`'s scheduler attributes to an external
    /// channel.
    ///
    /// The attribute is declared external in the agent's scheduler;
    /// before each of the agent's advances the channel is polled for
    /// read-readiness within `timeout` and the decoded payload supplied
    /// to the store. A channel that misses the timeout fails that
    /// agent's round.
    pub fn attach_external(
        &mut self,
        agent: &str,
        attr: AttrRef,
        channel: Box<dyn ExternalChannel>,
        timeout: Duration,
    ) -> Result<(), CouplingError> {
        self.check_assembled("attach a channel")?;
        let Some(target) = self.agents.get_mut(agent) else {
            return Err(CouplingError::UnknownAgent {
                name: agent.to_string(),
            });
        };
        let Some(sched) = target.scheduler_mut() else {
            return Err(CouplingError::InvalidState {
                what: format!("agent '{agent}'"),
                operation: "attach a channel",
                state: "finalized",
            });
        };
        sched.declare_external(attr.clone());
        self.feeds
            .push(ExternalFeed::new(agent.to_string(), attr, channel, timeout));
        Ok(())
    }

    /// Advance every agent to `target`, one checkpoint-width round at a
    /// time.
    ///
    /// On failure global time stays at the last completed checkpoint;
    /// calling again with the same target resumes the aborted round.
    pub fn run_to_time(&mut self, target: f64) -> Result<(), CouplingError> {
        self.ensure_running()?;
        let cp = self.checkpoint_dt()?;

        if target < self.time && !times_close(target, self.time) {
            return Err(CouplingError::Time(TimeError::UnreachableTarget {
                agent: "coupling".into(),
                current: self.time,
                target,
                dt: cp,
            }));
        }

        while !times_close(self.time, target) && self.time < target {
            let next = self.time + cp;
            let checkpoint = if next > target || times_close(next, target) {
                target
            } else {
                next
            };
            self.run_round(checkpoint)?;
        }
        Ok(())
    }

    /// Finalize every agent exactly once, in reverse registration
    /// order, collecting failures instead of stopping at the first.
    /// Idempotent.
    pub fn finalize(&mut self) -> Result<(), CouplingError> {
        if self.state == CouplingState::Finalized {
            return Ok(());
        }
        self.state = CouplingState::Finalized;

        let mut failures = Vec::new();
        for agent in self.agents.values_mut().rev() {
            if let Err(e) = agent.finalize() {
                warn!("agent '{}' failed to finalize: {e}", agent.name());
                failures.push((agent.name().to_string(), e.to_string()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CouplingError::Finalize { failures })
        }
    }

    // ── Internals ──────────────────────────────────────────────────

    fn check_assembled(&self, operation: &'static str) -> Result<(), CouplingError> {
        if self.state == CouplingState::Assembled {
            Ok(())
        } else {
            Err(CouplingError::InvalidState {
                what: "coupling".into(),
                operation,
                state: self.state.label(),
            })
        }
    }

    /// Checkpoint width: the explicit override, or the largest agent
    /// timestep.
    fn checkpoint_dt(&self) -> Result<f64, CouplingError> {
        if let Some(dt) = self.config.checkpoint_dt {
            validate_timestep(dt)?;
            return Ok(dt);
        }
        self.agents
            .values()
            .map(Agent::dt)
            .fold(None, |acc: Option<f64>, dt| {
                Some(acc.map_or(dt, |a| a.max(dt)))
            })
            .ok_or_else(|| CouplingError::InvalidState {
                what: "coupling".into(),
                operation: "run",
                state: "empty",
            })
    }

    /// First transition to `Running`: build every agent's scheduler and
    /// seed the link series with any initial producer values, so a
    /// consumer's first sub-steps interpolate instead of holding the
    /// checkpoint value constant.
    fn ensure_running(&mut self) -> Result<(), CouplingError> {
        if self.state == CouplingState::Finalized {
            return Err(CouplingError::InvalidState {
                what: "coupling".into(),
                operation: "run",
                state: self.state.label(),
            });
        }
        for agent in self.agents.values_mut() {
            agent.make_ready()?;
        }
        if self.state == CouplingState::Assembled {
            for link in &self.links {
                let producer = &self.agents[&link.producer];
                let seed = producer
                    .scheduler()
                    .and_then(|s| s.store().get(&link.attr));
                if let Some(v) = seed {
                    link.series
                        .lock()
                        .map_err(|_| CouplingError::Round {
                            agent: link.producer.clone(),
                            source: RoundError::Sync(SyncError::Poisoned),
                        })?
                        .push(self.time, v.to_vec());
                }
            }
            self.state = CouplingState::Running;
        }
        Ok(())
    }

    /// Producer-before-consumer agent order: Kahn's algorithm over the
    /// link edges, lowest registration index first among ready agents.
    /// A link cycle (two-way coupling) is broken at the lowest-index
    /// remaining agent, so the order is still deterministic.
    fn agent_order(&self) -> Vec<usize> {
        let n = self.agents.len();
        let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut indeg = vec![0usize; n];
        for link in &self.links {
            let (Some(p), Some(c)) = (
                self.agents.get_index_of(link.producer.as_str()),
                self.agents.get_index_of(link.consumer.as_str()),
            ) else {
                continue;
            };
            if !succs[p].contains(&c) {
                succs[p].push(c);
                indeg[c] += 1;
            }
        }

        let mut emitted = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while order.len() < n {
            let next = (0..n)
                .find(|&i| !emitted[i] && indeg[i] == 0)
                .or_else(|| (0..n).find(|&i| !emitted[i]));
            let Some(i) = next else { break };
            emitted[i] = true;
            order.push(i);
            for &s in &succs[i] {
                indeg[s] = indeg[s].saturating_sub(1);
            }
        }
        order
    }

    /// One coupling round: every agent to `checkpoint`, producers
    /// first. Global time moves only if every agent arrives.
    fn run_round(&mut self, checkpoint: f64) -> Result<(), CouplingError> {
        debug!("coupling round {} to t={checkpoint}", self.rounds);
        let order = self.agent_order();
        let agents = &mut self.agents;
        let feeds = &mut self.feeds;
        let links = &self.links;

        for idx in order {
            let Some((name, agent)) = agents.get_index_mut(idx) else {
                continue;
            };
            let name = name.clone();

            for feed in feeds.iter_mut().filter(|f| f.agent == name) {
                let value = feed.pump().map_err(|source| CouplingError::Round {
                    agent: name.clone(),
                    source,
                })?;
                agent.supply_external(feed.attr.clone(), value)?;
            }

            agent.advance(checkpoint)?;

            for link in links.iter().filter(|l| l.producer == name) {
                let value = agent
                    .scheduler()
                    .and_then(|s| s.store().get(&link.attr));
                let Some(value) = value else {
                    return Err(CouplingError::MissingLinkValue {
                        agent: name.clone(),
                        attr: link.attr.clone(),
                    });
                };
                link.series
                    .lock()
                    .map_err(|_| CouplingError::Round {
                        agent: name.clone(),
                        source: RoundError::Sync(SyncError::Poisoned),
                    })?
                    .push(checkpoint, value.to_vec());
            }
        }

        self.time = checkpoint;
        self.rounds += 1;
        Ok(())
    }
}
