//! Test utilities and mock types for Tandem development.
//!
//! Provides canned [`Action`] implementations (recording, producing,
//! failing) and a [`ScriptedChannel`] mock for the external-channel
//! seam.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tandem_action::{Action, RoundContext};
use tandem_core::{ActionError, AttrRef, ChannelError, ExternalChannel, Interest};

/// Shared execution log. Actions push their name when they run; tests
/// assert on the resulting order.
pub type RunLog = Arc<Mutex<Vec<String>>>;

/// Create an empty run log.
pub fn run_log() -> RunLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Action that records its execution into a [`RunLog`] and writes a
/// constant `[1.0]` to each declared output.
pub struct RecordingAction {
    name: String,
    priority: i32,
    reads: Vec<AttrRef>,
    writes: Vec<AttrRef>,
    log: RunLog,
}

impl RecordingAction {
    pub fn new(
        name: &str,
        reads: Vec<AttrRef>,
        writes: Vec<AttrRef>,
        log: &RunLog,
    ) -> Self {
        Self {
            name: name.to_string(),
            priority: 0,
            reads,
            writes,
            log: Arc::clone(log),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Action for RecordingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn reads(&self) -> Vec<AttrRef> {
        self.reads.clone()
    }

    fn writes(&self) -> Vec<AttrRef> {
        self.writes.clone()
    }

    fn run(&self, ctx: &mut RoundContext) -> Result<(), ActionError> {
        self.log
            .lock()
            .map_err(|_| ActionError::Failed {
                reason: "run log poisoned".into(),
            })?
            .push(self.name.clone());
        for attr in &self.writes {
            ctx.set(attr.clone(), vec![1.0])?;
        }
        Ok(())
    }
}

/// Action that writes a fixed value to a single attribute.
pub struct ProducerAction {
    name: String,
    target: AttrRef,
    value: Vec<f64>,
}

impl ProducerAction {
    pub fn new(name: &str, target: AttrRef, value: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            target,
            value,
        }
    }
}

impl Action for ProducerAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> Vec<AttrRef> {
        vec![]
    }

    fn writes(&self) -> Vec<AttrRef> {
        vec![self.target.clone()]
    }

    fn run(&self, ctx: &mut RoundContext) -> Result<(), ActionError> {
        ctx.set(self.target.clone(), self.value.clone())
    }
}

/// Action that always fails with the given reason.
pub struct FailingAction {
    name: String,
    reason: String,
    writes: Vec<AttrRef>,
}

impl FailingAction {
    pub fn new(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            reason: reason.to_string(),
            writes: vec![],
        }
    }

    /// Declare write attributes so downstream consumers depend on this
    /// action even though it never produces them.
    pub fn with_writes(mut self, writes: Vec<AttrRef>) -> Self {
        self.writes = writes;
        self
    }
}

impl Action for FailingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> Vec<AttrRef> {
        vec![]
    }

    fn writes(&self) -> Vec<AttrRef> {
        self.writes.clone()
    }

    fn run(&self, _ctx: &mut RoundContext) -> Result<(), ActionError> {
        Err(ActionError::Failed {
            reason: self.reason.clone(),
        })
    }
}

/// Mock [`ExternalChannel`] backed by in-memory queues.
///
/// Pre-load inbound payloads with [`push_inbound`](Self::push_inbound);
/// inspect what the code under test wrote with
/// [`outbound`](Self::outbound).
pub struct ScriptedChannel {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<Vec<u8>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
            outbound: Vec::new(),
        }
    }

    /// Queue a payload to be returned by the next `read()`.
    pub fn push_inbound(&mut self, payload: Vec<u8>) {
        self.inbound.push_back(payload);
    }

    /// Queue a little-endian f64 payload.
    pub fn push_values(&mut self, values: &[f64]) {
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.push_inbound(bytes);
    }

    /// Payloads written by the code under test, in write order.
    pub fn outbound(&self) -> &[Vec<u8>] {
        &self.outbound
    }
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalChannel for ScriptedChannel {
    fn poll_ready(&self, interest: Interest, _timeout: Duration) -> Result<bool, ChannelError> {
        Ok(match interest {
            Interest::Read => !self.inbound.is_empty(),
            Interest::Write => true,
            Interest::Exception => false,
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        let Some(payload) = self.inbound.front_mut() else {
            return Ok(0);
        };
        let n = payload.len().min(buf.len());
        buf[..n].copy_from_slice(&payload[..n]);
        if n == payload.len() {
            self.inbound.pop_front();
        } else {
            payload.drain(..n);
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, ChannelError> {
        self.outbound.push(buf.to_vec());
        Ok(buf.len())
    }
}
