//! Protocol contract violations.
//!
//! These are never recoverable locally: a message that breaks the envelope or
//! request schema aborts the dispatch cycle regardless of catching mode.

/// A message that does not conform to the RMI wire contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Envelope metadata is missing, ill-typed, or inconsistent with its `version`.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    /// The `request` payload is missing fields or has ill-typed `args`/`kws`/`cntr`.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

/// Errors from encoding or decoding wire bytes.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("msgpack encode failed: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),
    #[error("msgpack decode failed: {0}")]
    MsgPackDecode(#[from] rmpv::decode::Error),
    #[error("json codec failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("value conversion failed: {0}")]
    Value(#[from] rmpv::ext::Error),
}
