//! Channel-backed in-process transport.
//!
//! [`channel`] returns the agent side ([`MemoryQueue`], a [`QueueHandle`]) and
//! the caller side ([`MemoryPeer`]), connected by two bounded mpsc channels.

use std::time::Duration;

use async_trait::async_trait;
use rmi_core::{Envelope, Value};
use tokio::sync::mpsc;

use super::{QueueHandle, TransportError};

/// Creates a connected queue/peer pair with the given per-direction capacity.
#[must_use]
pub fn channel(capacity: usize) -> (MemoryQueue, MemoryPeer) {
    let (request_tx, request_rx) = mpsc::channel(capacity);
    let (reply_tx, reply_rx) = mpsc::channel(capacity);
    (
        MemoryQueue {
            requests: request_rx,
            replies: reply_tx,
        },
        MemoryPeer {
            requests: request_tx,
            replies: reply_rx,
        },
    )
}

/// Agent side of an in-memory queue.
#[derive(Debug)]
pub struct MemoryQueue {
    requests: mpsc::Receiver<Value>,
    replies: mpsc::Sender<Envelope>,
}

#[async_trait]
impl QueueHandle for MemoryQueue {
    async fn receive(&mut self, wait: Option<Duration>) -> Result<Value, TransportError> {
        match wait {
            None => self.requests.recv().await.ok_or(TransportError::Closed),
            Some(bound) => match tokio::time::timeout(bound, self.requests.recv()).await {
                Ok(Some(message)) => Ok(message),
                Ok(None) => Err(TransportError::Closed),
                Err(_elapsed) => Err(TransportError::Timeout(bound)),
            },
        }
    }

    async fn send(&mut self, message: Envelope) -> Result<(), TransportError> {
        self.replies
            .send(message)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// Caller side of an in-memory queue: submits requests and reads replies.
#[derive(Debug)]
pub struct MemoryPeer {
    requests: mpsc::Sender<Value>,
    replies: mpsc::Receiver<Envelope>,
}

impl MemoryPeer {
    /// Enqueues a raw request message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the agent side has been dropped.
    pub async fn submit(&self, message: Value) -> Result<(), TransportError> {
        self.requests
            .send(message)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Waits for the next reply envelope; `None` once the agent side is gone.
    pub async fn next_reply(&mut self) -> Option<Envelope> {
        self.replies.recv().await
    }

    /// Returns a reply if one is already queued.
    pub fn try_next_reply(&mut self) -> Option<Envelope> {
        self.replies.try_recv().ok()
    }
}
