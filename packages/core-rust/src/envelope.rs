//! Envelope metadata carried alongside every RMI request and response.
//!
//! Field names match the wire schema exactly (`routing`, `replyto`, `version`,
//! `status`, `result`). Fields this crate does not interpret are kept in
//! [`Envelope::extra`] so that responses echo them back unchanged.

use std::collections::BTreeMap;

use rmpv::Value;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// The `[routing_id, destination]` pair.
///
/// Serialized as a two-element array; any other arity is rejected on decode.
/// A `None` (or nil) destination marks a request whose caller expects no reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routing(pub Value, pub Option<Value>);

impl Routing {
    #[must_use]
    pub fn new(routing_id: impl Into<Value>, destination: Option<Value>) -> Self {
        Self(routing_id.into(), destination)
    }

    #[must_use]
    pub fn routing_id(&self) -> &Value {
        &self.0
    }

    /// Destination element, treating an explicit nil the same as absence.
    #[must_use]
    pub fn destination(&self) -> Option<&Value> {
        match &self.1 {
            None | Some(Value::Nil) => None,
            Some(value) => Some(value),
        }
    }
}

// ---------------------------------------------------------------------------
// ReplyAddress
// ---------------------------------------------------------------------------

/// Structured `{exchange, routing_key}` reply destination.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyAddress {
    pub exchange: Value,
    pub routing_key: Value,
}

impl ReplyAddress {
    pub const EXCHANGE: &'static str = "exchange";
    pub const ROUTING_KEY: &'static str = "routing_key";

    /// Reads an address out of a map value. Returns `None` unless both keys are present.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let entries = value.as_map()?;
        let lookup = |name: &str| {
            entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(name))
                .map(|(_, v)| v.clone())
        };
        Some(Self {
            exchange: lookup(Self::EXCHANGE)?,
            routing_key: lookup(Self::ROUTING_KEY)?,
        })
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Map(vec![
            (Value::from(Self::EXCHANGE), self.exchange),
            (Value::from(Self::ROUTING_KEY), self.routing_key),
        ])
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Progress notification sent before a call executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Accepted,
    Started,
    Progress,
}

impl Status {
    /// Notifications in the order they are emitted for every replyable request.
    pub const SEQUENCE: [Status; 3] = [Status::Accepted, Status::Started, Status::Progress];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Accepted => "accepted",
            Status::Started => "started",
            Status::Progress => "progress",
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Structured failure kept inside the agent until the exception envelope is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Display form of the error; becomes `exval`.
    pub message: String,
    /// Captured trace; becomes `xstate.trace`.
    pub trace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionState {
    pub trace: String,
}

/// Payload of the `result` field on a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseResult {
    Exception { exval: String, xstate: ExceptionState },
    Return { retval: Value },
}

impl From<&Failure> for ResponseResult {
    fn from(failure: &Failure) -> Self {
        Self::Exception {
            exval: failure.message.clone(),
            xstate: ExceptionState {
                trace: failure.trace.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Everything in a message except the `request` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub routing: Routing,
    /// Null, a legacy `{exchange, routing_key}` map, or an opaque routing key.
    #[serde(default)]
    pub replyto: Option<Value>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_loose_version"
    )]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResponseResult>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Envelope {
    #[must_use]
    pub fn new(routing: Routing, replyto: Option<Value>, version: impl Into<String>) -> Self {
        Self {
            routing,
            replyto,
            version: Some(version.into()),
            status: None,
            result: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Accepts the version as a string or a bare number (`2.0` on the wire).
fn deserialize_loose_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Nil) => None,
        Some(Value::String(s)) => s.into_str(),
        Some(Value::Integer(n)) => Some(n.to_string()),
        Some(Value::F64(f)) => Some(format_float_version(f)),
        Some(Value::F32(f)) => Some(format_float_version(f64::from(f))),
        Some(other) => {
            return Err(serde::de::Error::custom(format_args!(
                "version must be a string or number, got {other}"
            )))
        }
    })
}

/// `2.0` must read as `"2.0"`, not `"2"`, to keep the original spelling in logs.
fn format_float_version(f: f64) -> String {
    if f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}
