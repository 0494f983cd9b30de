//! Wire-format selection from the envelope `version` field.
//!
//! Peers speak one of two `replyto` dialects. Which one applies is decided by
//! comparing the envelope version against [`CURRENT_FORMAT_SINCE`]. Versions are
//! loose (`"0.5"`, `"2"`, `"2.1.3"`), so missing minor/patch components are padded
//! with zeros before comparison under semver rules.

use semver::Version;

use crate::error::ProtocolError;

/// First version that uses the opaque `replyto` routing key.
pub const CURRENT_FORMAT_SINCE: Version = Version::new(2, 0, 0);

/// The `replyto` dialect of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `replyto` is `{exchange, routing_key}`; fields are swapped directly on inversion.
    Legacy,
    /// `replyto` is an opaque routing key; the reply source is the local identity.
    Current,
}

impl WireFormat {
    /// Selects the wire format for a loose version string.
    ///
    /// The boundary is inclusive: `"2.0"` is already [`WireFormat::Current`].
    /// Pre-release tags sort below their release, so `"2.0.0-rc.1"` is legacy.
    /// Build metadata is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedEnvelope`] if the string is not a loose
    /// numeric version.
    pub fn for_version(version: &str) -> Result<Self, ProtocolError> {
        let parsed = parse_loose(version).ok_or_else(|| {
            ProtocolError::MalformedEnvelope(format!("unparseable version: {version:?}"))
        })?;
        if parsed >= CURRENT_FORMAT_SINCE {
            Ok(Self::Current)
        } else {
            Ok(Self::Legacy)
        }
    }
}

/// Parses `"2"`, `"2.0"`, `"2.0.1-rc.1"` and similar into a full semver `Version`.
fn parse_loose(version: &str) -> Option<Version> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    let split = version.find(['-', '+']).unwrap_or(version.len());
    let (numeric, suffix) = version.split_at(split);

    let mut parts: Vec<u64> = Vec::with_capacity(3);
    for component in numeric.split('.') {
        parts.push(component.parse().ok()?);
    }
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    parts.resize(3, 0);

    Version::parse(&format!("{}.{}.{}{suffix}", parts[0], parts[1], parts[2])).ok()
}
