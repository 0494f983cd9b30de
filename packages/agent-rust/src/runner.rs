//! Background dispatch loop.
//!
//! A [`RunningAgent`] owns one tokio task that polls a queue handle at a fixed
//! rate and dispatches every message it receives. Idle polls (timeout or empty
//! queue) keep the loop going; any other dispatch error ends the task and is
//! handed back to whoever owns the agent.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::poll_interval;
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, RunnerError};
use crate::telemetry;
use crate::transport::{QueueHandle, TransportError};

// ---------------------------------------------------------------------------
// RunningAgent
// ---------------------------------------------------------------------------

/// Handle to a background dispatch loop.
///
/// Call [`RunningAgent::stop`] to shut the loop down and collect its result.
/// Dropping the handle only signals cancellation; the task then exits on its
/// own within one polling interval.
#[derive(Debug)]
pub struct RunningAgent {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), DispatchError>>>,
}

impl RunningAgent {
    /// Signal cancellation and wait for the loop to exit.
    ///
    /// # Errors
    ///
    /// - [`RunnerError::Fatal`] if the loop had already died on a dispatch error.
    /// - [`RunnerError::Panicked`] if the task panicked.
    pub async fn stop(mut self) -> Result<(), RunnerError> {
        self.cancel.cancel();
        tokio::task::yield_now().await;
        self.join().await
    }

    /// Whether the loop has exited, either after cancellation or on a fatal error.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the task without signaling it. Cancel-safe: if this future is
    /// dropped early the task handle is kept for a later join.
    async fn join(&mut self) -> Result<(), RunnerError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        self.task = None;
        joined?.map_err(RunnerError::Fatal)
    }
}

impl Drop for RunningAgent {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Dispatcher entry points
// ---------------------------------------------------------------------------

impl Dispatcher {
    /// Spawn a dispatch loop polling `handle` `frequency_hz` times per second.
    ///
    /// Each poll waits at most `1 / frequency_hz` for a message. Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidFrequency`] unless `frequency_hz` is a
    /// positive finite number.
    pub fn start<H>(&self, handle: H, frequency_hz: f64) -> Result<RunningAgent, RunnerError>
    where
        H: QueueHandle + 'static,
    {
        let interval =
            poll_interval(frequency_hz).ok_or(RunnerError::InvalidFrequency(frequency_hz))?;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(self.clone(), handle, interval, cancel.clone()));

        Ok(RunningAgent {
            cancel,
            task: Some(task),
        })
    }

    /// [`Dispatcher::start`] at the rate configured in
    /// [`AgentConfig::poll_frequency_hz`](crate::config::AgentConfig::poll_frequency_hz).
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::start`].
    pub fn start_configured<H>(&self, handle: H) -> Result<RunningAgent, RunnerError>
    where
        H: QueueHandle + 'static,
    {
        self.start(handle, self.poll_frequency_hz())
    }

    /// Run `body` while a dispatch loop serves `handle` in the background.
    ///
    /// The loop is stopped and fully joined before this returns, whichever
    /// way `body` ends. If the loop dies first, `body` is dropped unfinished
    /// and the loop's error is returned.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::start`] and [`RunningAgent::stop`].
    pub async fn running<H, F, Fut, T>(
        &self,
        handle: H,
        frequency_hz: f64,
        body: F,
    ) -> Result<T, RunnerError>
    where
        H: QueueHandle + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut agent = self.start(handle, frequency_hz)?;
        let body = body();
        tokio::pin!(body);

        tokio::select! {
            value = &mut body => {
                agent.stop().await?;
                Ok(value)
            }
            joined = agent.join() => {
                // The loop only exits cleanly once cancelled, which nothing
                // does while the body is still pending.
                joined?;
                Ok(body.await)
            }
        }
    }
}

async fn run_loop<H>(
    dispatcher: Dispatcher,
    mut handle: H,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<(), DispatchError>
where
    H: QueueHandle,
{
    info!(identity = %dispatcher.identity(), ?interval, "dispatch loop started");
    loop {
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            break;
        }

        match dispatcher.dispatch_within(&mut handle, Some(interval)).await {
            Ok(outcome) => debug!(outcome = outcome.as_str(), "message dispatched"),
            Err(DispatchError::Transport(TransportError::Timeout(_))) => {
                telemetry::record_idle_poll();
            }
            Err(DispatchError::Transport(TransportError::Empty)) => {
                telemetry::record_idle_poll();
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(interval) => {}
                }
            }
            Err(err) => {
                error!(error = %err, "dispatch loop terminated");
                return Err(err);
            }
        }
    }
    info!(identity = %dispatcher.identity(), "dispatch loop stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
