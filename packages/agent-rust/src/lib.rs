//! RMI agent: class registry, call resolution, dispatcher, and background runner.
//!
//! A [`Dispatcher`] takes one request message off a [`QueueHandle`], calls the
//! named method on a freshly constructed instance from the [`ClassRegistry`],
//! and sends status notifications and the result back along the inverted
//! envelope. [`Dispatcher::running`] keeps doing that in a background task.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod profile;
pub mod registry;
pub mod resolver;
pub mod runner;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::{AgentConfig, LogFormat};
pub use dispatcher::{Dispatcher, Outcome};
pub use error::{CallError, DispatchError, RunnerError};
pub use profile::Profile;
pub use registry::{Arguments, ClassFactory, ClassRegistry, Invokable};
pub use resolver::{resolve, DeferredCall};
pub use runner::RunningAgent;
pub use telemetry::{init_tracing, init_tracing_from};
pub use transport::{MemoryPeer, MemoryQueue, QueueHandle, TransportError};
