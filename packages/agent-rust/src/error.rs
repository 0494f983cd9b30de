//! Error types for call resolution, dispatch, and the background runner.

use rmi_core::ProtocolError;

use crate::transport::TransportError;

/// Failure resolving or executing a requested call.
///
/// Subject to the dispatcher's catching mode: either serialized to the caller
/// or returned from `dispatch`.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("no class named {classname:?} is registered")]
    UnknownClass { classname: String },
    #[error("{classname} has no method {method:?}")]
    UnknownMethod { classname: String, method: String },
    /// Raised by a constructor or method; displays exactly as the inner error.
    #[error(transparent)]
    Application(anyhow::Error),
}

impl CallError {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownClass { .. } | Self::UnknownMethod { .. } => "resolution",
            Self::Application(_) => "application",
        }
    }
}

/// Errors that end a dispatch cycle without a normal outcome.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Contract violation; never caught.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Call failure while catching mode is off.
    #[error(transparent)]
    Call(#[from] CallError),
}

impl DispatchError {
    /// True when no message was available; a polling loop treats this as a no-op.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_idle())
    }
}

/// Errors surfaced by a background runner to the scope that owns it.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("poll frequency must be a positive finite rate, got {0}")]
    InvalidFrequency(f64),
    #[error("background dispatch failed: {0}")]
    Fatal(#[from] DispatchError),
    #[error("background task panicked or was aborted: {0}")]
    Panicked(#[from] tokio::task::JoinError),
}
