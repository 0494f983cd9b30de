//! Byte-level encodings used by queue transports.
//!
//! Outbound envelopes are written as named `MsgPack` (`rmp_serde::to_vec_named()`)
//! or JSON. Inbound bytes decode to a raw [`rmpv::Value`], which is then handed
//! to [`crate::codec::strip`].

use rmpv::Value;
use serde::Serialize;

use crate::error::WireError;

/// Encodes any wire type as a `MsgPack` map with named fields.
///
/// # Errors
///
/// Returns [`WireError::MsgPackEncode`] if serialization fails.
pub fn encode_msgpack<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decodes `MsgPack` bytes into a raw message value.
///
/// # Errors
///
/// Returns [`WireError::MsgPackDecode`] on truncated or invalid input.
pub fn decode_msgpack(bytes: &[u8]) -> Result<Value, WireError> {
    Ok(rmpv::decode::read_value(&mut &bytes[..])?)
}

/// Encodes any wire type as JSON.
///
/// # Errors
///
/// Returns [`WireError::Json`] if the value has no JSON form (e.g. non-string map keys).
pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes JSON bytes into a raw message value.
///
/// # Errors
///
/// Returns [`WireError::Json`] on invalid JSON.
pub fn decode_json(bytes: &[u8]) -> Result<Value, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Converts any serializable value into the dynamic value model.
///
/// # Errors
///
/// Returns [`WireError::Value`] if serialization fails.
pub fn to_value<T: Serialize>(value: &T) -> Result<Value, WireError> {
    Ok(rmpv::ext::to_value(value)?)
}
