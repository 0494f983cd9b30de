//! RMI core: envelope schema, wire-format gating, envelope codec, and wire encoding.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod request;
pub mod version;
pub mod wire;

pub use codec::{build_exception, build_response, build_status, invert, is_forgettable, strip};
pub use envelope::{
    Envelope, ExceptionState, Failure, ReplyAddress, ResponseResult, Routing, Status,
};
pub use error::{ProtocolError, WireError};
pub use request::{Constructor, Request};
pub use version::{WireFormat, CURRENT_FORMAT_SINCE};

/// Dynamic value type for arguments, return values, and routing fields.
pub use rmpv::Value;
