use std::time::Duration;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable `fmt` output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Agent-level configuration.
///
/// Controls the reply identity, exception propagation, and background polling rate.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Reply source name advertised in current-format responses.
    pub identity: String,
    /// Serialize call failures to the caller instead of failing `dispatch`.
    pub catching: bool,
    /// Background polling rate in dispatch attempts per second, used by
    /// `Dispatcher::start_configured`.
    pub poll_frequency_hz: f64,
    /// Subscriber output installed by `telemetry::init_tracing_from`.
    pub log_format: LogFormat,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            identity: "rmi_agent".to_string(),
            catching: false,
            poll_frequency_hz: 3.0,
            log_format: LogFormat::Pretty,
        }
    }
}

/// `1 / frequency` seconds, rejecting zero, negative, and non-finite rates.
pub(crate) fn poll_interval(frequency_hz: f64) -> Option<Duration> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(frequency_hz.recip())
        .ok()
        .filter(|interval| !interval.is_zero())
}
