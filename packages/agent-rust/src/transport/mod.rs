//! Queue-handle abstraction consumed by the dispatcher.
//!
//! Production transports (AMQP, Qpid, ...) live outside this crate; they only
//! need to implement [`QueueHandle`]. An in-process channel transport is
//! provided in [`memory`].

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use rmi_core::{Envelope, Value};

pub use memory::{MemoryPeer, MemoryQueue};

/// Errors surfaced by a queue handle.
///
/// `Timeout` and `Empty` are expected while idle-polling; everything else is a
/// transport failure that terminates a background runner.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no message within {0:?}")]
    Timeout(Duration),
    #[error("queue is empty")]
    Empty,
    #[error("queue closed")]
    Closed,
    #[error("transport failure: {0}")]
    Other(#[from] anyhow::Error),
}

impl TransportError {
    /// True for the "nothing to do" conditions a polling loop simply skips.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Empty)
    }
}

/// One end of a message queue, owned by exactly one dispatch loop.
#[async_trait]
pub trait QueueHandle: Send {
    /// Reads one structured message, waiting at most `wait` (`None` waits indefinitely).
    ///
    /// Must be cancel-safe: dropping the future before it resolves must not
    /// lose a message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Timeout`] or [`TransportError::Empty`] when no
    /// message arrives within the bound, or another variant on transport failure.
    async fn receive(&mut self, wait: Option<Duration>) -> Result<Value, TransportError>;

    /// Writes one outbound envelope. No acknowledgement from the peer is awaited.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be handed to the transport.
    async fn send(&mut self, message: Envelope) -> Result<(), TransportError>;
}

#[async_trait]
impl<H: QueueHandle + ?Sized> QueueHandle for Box<H> {
    async fn receive(&mut self, wait: Option<Duration>) -> Result<Value, TransportError> {
        (**self).receive(wait).await
    }

    async fn send(&mut self, message: Envelope) -> Result<(), TransportError> {
        (**self).send(message).await
    }
}
