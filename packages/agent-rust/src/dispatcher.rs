//! Single-message RMI dispatch.
//!
//! One cycle: receive → strip → invert → (status notifications) → resolve →
//! execute → response, exception, or nothing. Status notifications and
//! responses are only sent when the inverted envelope has a destination.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rmi_core::{codec, Failure, Status, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::AgentConfig;
use crate::error::{CallError, DispatchError};
use crate::profile::Profile;
use crate::registry::ClassRegistry;
use crate::resolver::resolve;
use crate::telemetry;
use crate::transport::{QueueHandle, TransportError};

/// Terminal state of a successful dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call returned and a result envelope was sent.
    Responded,
    /// The call failed in catching mode and an exception envelope was sent.
    ExceptionSent,
    /// The caller expects no reply; the result or failure was only logged.
    Forgotten,
}

impl Outcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Responded => "responded",
            Self::ExceptionSent => "exception_sent",
            Self::Forgotten => "forgotten",
        }
    }
}

/// Consumes RMI requests from a queue handle and answers them.
///
/// Cheap to clone: the registry and profile are shared.
#[derive(Clone)]
pub struct Dispatcher {
    identity: Value,
    registry: Arc<ClassRegistry>,
    profile: Arc<Profile>,
    catching: bool,
    poll_frequency_hz: f64,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: &AgentConfig, registry: Arc<ClassRegistry>, profile: Arc<Profile>) -> Self {
        Self {
            identity: Value::from(config.identity.as_str()),
            registry,
            profile,
            catching: config.catching,
            poll_frequency_hz: config.poll_frequency_hz,
        }
    }

    /// A dispatcher identical to this one except for its catching mode.
    ///
    /// `self` is left untouched, so the previous mode is still in effect for
    /// every other holder once the returned value goes out of scope.
    #[must_use]
    pub fn catching(&self, catching: bool) -> Self {
        Self {
            catching,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn is_catching(&self) -> bool {
        self.catching
    }

    /// Reply source advertised in current-format responses.
    #[must_use]
    pub fn identity(&self) -> &Value {
        &self.identity
    }

    /// Background polling rate taken from [`AgentConfig::poll_frequency_hz`].
    #[must_use]
    pub fn poll_frequency_hz(&self) -> f64 {
        self.poll_frequency_hz
    }

    /// Waits for one message and runs a full dispatch cycle on it.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Transport`] if receiving or sending fails.
    /// - [`DispatchError::Protocol`] for a malformed envelope or request, in any mode.
    /// - [`DispatchError::Call`] if the call fails and catching mode is off.
    pub async fn dispatch<H>(&self, handle: &mut H) -> Result<Outcome, DispatchError>
    where
        H: QueueHandle + ?Sized,
    {
        self.dispatch_within(handle, None).await
    }

    /// Like [`Dispatcher::dispatch`], but gives up with
    /// [`TransportError::Timeout`] if no message arrives within `wait`.
    ///
    /// The bound covers only the receive; a call that has started always runs
    /// to completion and has its reply sent.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::dispatch`].
    pub async fn dispatch_within<H>(
        &self,
        handle: &mut H,
        wait: Option<Duration>,
    ) -> Result<Outcome, DispatchError>
    where
        H: QueueHandle + ?Sized,
    {
        let message = match wait {
            None => handle.receive(None).await?,
            Some(bound) => tokio::time::timeout(bound, handle.receive(Some(bound)))
                .await
                .unwrap_or(Err(TransportError::Timeout(bound)))?,
        };
        self.process(handle, message).await
    }

    /// Runs a dispatch cycle on an already received message.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::dispatch`], minus receive failures.
    #[instrument(level = "debug", skip_all, fields(identity = %self.identity, catching = self.catching))]
    pub async fn process<H>(&self, handle: &mut H, message: Value) -> Result<Outcome, DispatchError>
    where
        H: QueueHandle + ?Sized,
    {
        let (envelope, request) = codec::strip(message)?;
        debug!(routing = ?envelope.routing, request = ?request, "dispatching");
        let envelope = codec::invert(&envelope, &self.identity)?;
        let forget = codec::is_forgettable(&envelope);

        if !forget {
            for status in Status::SEQUENCE {
                handle.send(codec::build_status(&envelope, status)).await?;
            }
        }

        let target = request.target();
        let started = Instant::now();
        let result = match resolve(&self.registry, request, &self.profile) {
            Ok(call) => call.execute().await,
            Err(err) => Err(err),
        };
        telemetry::record_call_duration(started.elapsed());

        let outcome = match result {
            Ok(retval) if forget => {
                info!(%target, %retval, "forgetting response");
                Outcome::Forgotten
            }
            Ok(retval) => {
                handle.send(codec::build_response(&envelope, retval)).await?;
                Outcome::Responded
            }
            Err(err) if self.catching => {
                telemetry::record_failure(err.kind());
                let failure = capture_failure(&target, &err);
                warn!(%target, kind = err.kind(), trace = %failure.trace, "propagating failure");
                if forget {
                    Outcome::Forgotten
                } else {
                    handle.send(codec::build_exception(&envelope, &failure)).await?;
                    Outcome::ExceptionSent
                }
            }
            Err(err) => {
                telemetry::record_failure(err.kind());
                return Err(err.into());
            }
        };

        telemetry::record_outcome(outcome);
        Ok(outcome)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("identity", &self.identity)
            .field("catching", &self.catching)
            .field("poll_frequency_hz", &self.poll_frequency_hz)
            .field("classes", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Turns a call error into the message/trace pair sent to the caller.
///
/// The trace names the target, lists the error's cause chain, and appends the
/// backtrace when one was captured (`RUST_BACKTRACE`).
fn capture_failure(target: &str, err: &CallError) -> Failure {
    let mut trace = format!("{target}: {err}");
    if let CallError::Application(inner) = err {
        for cause in inner.chain().skip(1) {
            let _ = write!(trace, "\ncaused by: {cause}");
        }
        let backtrace = inner.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = write!(trace, "\n{backtrace}");
        }
    }
    Failure {
        message: err.to_string(),
        trace,
    }
}
