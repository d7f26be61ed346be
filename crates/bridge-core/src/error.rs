//! Error taxonomy for the device bridge.
//!
//! `TransportTransient` and `UnknownFault` are logged and swallowed at the
//! point they occur (worker loop, send path) — they never reach a caller as
//! `Result::Err`. `NegotiationChunkingViolation` and `DecodeFailure` are
//! protocol contract breaches and are returned.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport error: {0}")]
    TransportTransient(String),

    #[error("negotiation channel chunking violation: expected {expected} bytes, transport accepted {actual}")]
    NegotiationChunkingViolation { expected: usize, actual: usize },

    #[error("failed to decode argument buffer: {reason}")]
    DecodeFailure { reason: String },

    #[error("unknown fault in bridge worker: {0}")]
    UnknownFault(String),
}
