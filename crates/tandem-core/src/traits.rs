//! The external-data-channel seam.
//!
//! A distributed coupling receives some attribute payloads from outside
//! the process (subprocess pipes, sockets — supplied by collaborators).
//! The core consumes exactly two capabilities from such a source: "is it
//! ready within a timeout" and "move N bytes". Wire formats beyond a
//! flat f64 payload are out of scope.

use std::time::Duration;

use crate::error::ChannelError;

/// Which readiness condition to poll a channel for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interest {
    /// Data can be read without blocking.
    Read,
    /// Data can be written without blocking.
    Write,
    /// An exceptional condition is pending.
    Exception,
}

/// A byte-stream source or sink owned by an external collaborator.
///
/// Implementations wrap file descriptors, subprocess pipes, or an
/// in-memory queue in tests. All methods are non-blocking apart from
/// `poll_ready`, which blocks at most `timeout`.
pub trait ExternalChannel: Send {
    /// Whether the channel satisfies `interest` within `timeout`.
    fn poll_ready(&self, interest: Interest, timeout: Duration) -> Result<bool, ChannelError>;

    /// Read up to `buf.len()` bytes; returns the count actually read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError>;

    /// Write up to `buf.len()` bytes; returns the count actually written.
    fn write(&mut self, buf: &[u8]) -> Result<usize, ChannelError>;
}

/// Decode a byte payload into a flat f64 attribute value.
///
/// Payloads are little-endian f64 sequences; a trailing partial value
/// is rejected as [`ChannelError::MalformedPayload`].
pub fn decode_payload(bytes: &[u8]) -> Result<Vec<f64>, ChannelError> {
    if bytes.len() % 8 != 0 {
        return Err(ChannelError::MalformedPayload);
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(c);
            f64::from_le_bytes(raw)
        })
        .collect())
}
