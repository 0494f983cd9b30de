//! Tracing bootstrap and dispatch metrics.
//!
//! Metrics go through the `metrics` facade; nothing is recorded until the
//! embedding process installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AgentConfig, LogFormat};
use crate::dispatcher::Outcome;

/// Environment variable holding the `EnvFilter` directive.
pub const LOG_ENV: &str = "RMI_AGENT_LOG";

pub const DISPATCH_TOTAL: &str = "rmi_dispatch_total";
pub const DISPATCH_FAILURES_TOTAL: &str = "rmi_dispatch_failures_total";
pub const RUNNER_IDLE_POLLS_TOTAL: &str = "rmi_runner_idle_polls_total";
pub const CALL_DURATION_SECONDS: &str = "rmi_call_duration_seconds";

/// Install a global tracing subscriber filtered by [`LOG_ENV`].
///
/// Defaults to `info` if the variable is unset or invalid. Returns `false`
/// if a global subscriber was already installed, leaving it in place.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    installed.is_ok()
}

/// [`init_tracing`] with the format chosen in `config`.
pub fn init_tracing_from(config: &AgentConfig) -> bool {
    init_tracing(config.log_format)
}

pub(crate) fn record_outcome(outcome: Outcome) {
    counter!(DISPATCH_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub(crate) fn record_failure(kind: &'static str) {
    counter!(DISPATCH_FAILURES_TOTAL, "kind" => kind).increment(1);
}

pub(crate) fn record_idle_poll() {
    counter!(RUNNER_IDLE_POLLS_TOTAL).increment(1);
}

pub(crate) fn record_call_duration(elapsed: Duration) {
    histogram!(CALL_DURATION_SECONDS).record(elapsed.as_secs_f64());
}
