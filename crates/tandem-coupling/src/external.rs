//! Feeding externally supplied attributes from channels.
//!
//! A feed binds one agent-scheduler attribute to an [`ExternalChannel`].
//! Before each of the agent's advances the coupling pumps its feeds:
//! poll for read-readiness within the configured timeout, read the
//! payload, decode it, and supply the value to the scheduler. A channel
//! that is not ready in time fails the round.

use std::time::Duration;

use tandem_core::{decode_payload, AttrRef, AttrValue, ExternalChannel, Interest, RoundError};

/// Largest accepted inbound payload, in bytes.
const MAX_PAYLOAD: usize = 64 * 1024;

/// One attribute fed from outside the process.
pub(crate) struct ExternalFeed {
    pub(crate) agent: String,
    pub(crate) attr: AttrRef,
    channel: Box<dyn ExternalChannel>,
    timeout: Duration,
}

impl ExternalFeed {
    pub(crate) fn new(
        agent: String,
        attr: AttrRef,
        channel: Box<dyn ExternalChannel>,
        timeout: Duration,
    ) -> Self {
        Self {
            agent,
            attr,
            channel,
            timeout,
        }
    }

    /// Poll, read, and decode the next payload.
    pub(crate) fn pump(&mut self) -> Result<AttrValue, RoundError> {
        let ready = self
            .channel
            .poll_ready(Interest::Read, self.timeout)
            .map_err(|e| self.external(format!("poll failed: {e}")))?;
        if !ready {
            return Err(self.external(format!(
                "channel not ready within {:?}",
                self.timeout
            )));
        }

        let mut buf = vec![0u8; MAX_PAYLOAD];
        let n = self
            .channel
            .read(&mut buf)
            .map_err(|e| self.external(format!("read failed: {e}")))?;
        if n == 0 {
            return Err(self.external("channel produced no data".to_string()));
        }
        decode_payload(&buf[..n]).map_err(|e| self.external(e.to_string()))
    }

    fn external(&self, reason: String) -> RoundError {
        RoundError::External {
            attr: self.attr.clone(),
            reason,
        }
    }
}
