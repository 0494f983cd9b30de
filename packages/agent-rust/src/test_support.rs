//! Shared mocks for unit tests: a recording queue handle, sample classes, and
//! message builders.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rmi_core::{Envelope, Value};

use crate::profile::Profile;
use crate::registry::{Arguments, ClassRegistry, Invokable};
use crate::transport::{QueueHandle, TransportError};

/// Application error raised by sample methods.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RuntimeFailure(pub String);

/// Builds a raw message value from JSON.
pub fn message(json: serde_json::Value) -> Value {
    rmi_core::wire::to_value(&json).expect("json converts to value")
}

/// A current-format request expecting a reply.
pub fn replyable(classname: &str, method: &str, args: serde_json::Value) -> Value {
    message(serde_json::json!({
        "routing": ["rid-1", "agent-queue"],
        "replyto": "caller-queue",
        "version": "2.0",
        "request": {"classname": classname, "method": method, "args": args, "kws": {}},
    }))
}

/// A request with a null `replyto`: nothing may be sent back.
pub fn forgettable(classname: &str, method: &str, args: serde_json::Value) -> Value {
    message(serde_json::json!({
        "routing": ["rid-2", "agent-queue"],
        "replyto": null,
        "version": "2.0",
        "request": {"classname": classname, "method": method, "args": args, "kws": {}},
    }))
}

pub fn sample_profile() -> Profile {
    Profile::from_json(r#"{"env": "test", "retries": 2}"#).expect("profile json")
}

// ---------------------------------------------------------------------------
// Recording queue handle
// ---------------------------------------------------------------------------

/// What a [`RecordingHandle`] does once its scripted messages run out.
#[derive(Debug, Clone, Copy)]
pub enum Drained {
    /// Wait out the bound, then report a timeout.
    Timeout,
    /// Report an empty queue immediately.
    Empty,
    /// Fail with a transport error.
    Fail(&'static str),
}

/// Observations shared between a test and the handle it gave away.
#[derive(Debug, Default)]
pub struct HandleProbe {
    sent: Mutex<Vec<Envelope>>,
    polls: AtomicUsize,
}

impl HandleProbe {
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

pub struct RecordingHandle {
    inbound: VecDeque<Value>,
    drained: Drained,
    probe: Arc<HandleProbe>,
}

impl RecordingHandle {
    pub fn new(messages: impl IntoIterator<Item = Value>) -> (Self, Arc<HandleProbe>) {
        let probe = Arc::new(HandleProbe::default());
        let handle = Self {
            inbound: messages.into_iter().collect(),
            drained: Drained::Timeout,
            probe: Arc::clone(&probe),
        };
        (handle, probe)
    }

    pub fn when_drained(mut self, drained: Drained) -> Self {
        self.drained = drained;
        self
    }
}

#[async_trait]
impl QueueHandle for RecordingHandle {
    async fn receive(&mut self, wait: Option<Duration>) -> Result<Value, TransportError> {
        self.probe.polls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.inbound.pop_front() {
            return Ok(message);
        }
        match self.drained {
            Drained::Timeout => {
                let bound = wait.unwrap_or(Duration::from_millis(10));
                tokio::time::sleep(bound).await;
                Err(TransportError::Timeout(bound))
            }
            Drained::Empty => Err(TransportError::Empty),
            Drained::Fail(reason) => Err(TransportError::Other(anyhow::anyhow!(reason))),
        }
    }

    async fn send(&mut self, message: Envelope) -> Result<(), TransportError> {
        self.probe.sent.lock().push(message);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sample classes
// ---------------------------------------------------------------------------

/// Stateless sample class.
#[derive(Debug, Default)]
pub struct Calculator;

#[async_trait]
impl Invokable for Calculator {
    fn responds_to(&self, method: &str) -> bool {
        matches!(method, "add" | "echo_profile" | "fail" | "slow")
    }

    async fn invoke(&self, method: &str, arguments: Arguments) -> anyhow::Result<Value> {
        match method {
            "add" => {
                let sum = arguments
                    .args
                    .iter()
                    .map(|v| v.as_i64().ok_or_else(|| anyhow::anyhow!("not an integer: {v}")))
                    .sum::<anyhow::Result<i64>>()?;
                Ok(Value::from(sum))
            }
            "echo_profile" => Ok(arguments.profile().cloned().unwrap_or(Value::Nil)),
            "fail" => Err(RuntimeFailure("x".to_string()).into()),
            "slow" => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(Value::from("done"))
            }
            other => anyhow::bail!("unhandled method {other}"),
        }
    }
}

/// Ordered record of constructions and calls made on [`Recorder`] instances.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<(String, Arguments)>>>);

impl CallLog {
    pub fn events(&self) -> Vec<(String, Arguments)> {
        self.0.lock().clone()
    }

    fn push(&self, event: &str, arguments: Arguments) {
        self.0.lock().push((event.to_string(), arguments));
    }
}

/// Sample class that logs its construction and every call.
pub struct Recorder {
    log: CallLog,
}

#[async_trait]
impl Invokable for Recorder {
    fn responds_to(&self, method: &str) -> bool {
        matches!(method, "bar" | "fail")
    }

    async fn invoke(&self, method: &str, arguments: Arguments) -> anyhow::Result<Value> {
        self.log.push(method, arguments);
        match method {
            "fail" => Err(RuntimeFailure("x".to_string()).into()),
            _ => Ok(Value::from("bar-result")),
        }
    }
}

/// A registry exposing [`Recorder`] under `name`, writing to `log`.
pub fn registry_with_recorder(name: &str, log: &CallLog) -> ClassRegistry {
    let registry = ClassRegistry::new();
    let log = log.clone();
    registry.register(name, move |arguments: Arguments| -> anyhow::Result<Box<dyn Invokable>> {
        log.push("construct", arguments);
        Ok(Box::new(Recorder { log: log.clone() }))
    });
    registry
}
