//! Runtime for txProc persistent applications.
//!
//! A persistent application is a long-lived worker process started by the
//! txProc broker. The broker writes request frames to the worker's standard
//! input and expects exactly one result frame per request on standard
//! output. While handling a request the worker may emit follow-up events,
//! which travel back to the broker over a pair of Unix domain sockets.
//!
//! The crate is organised around a single-threaded [`Dispatcher`]:
//!
//! - the [`multiplexer`] funnels frames from standard input and any extension
//!   sources onto one channel, each source read on its own thread;
//! - the dispatcher routes every record to the hooks of an [`Application`],
//!   writes the reply, runs regular tasks and flushes follow-up events;
//! - the [`transport`] module sends those events to the broker as datagrams
//!   or stream exchanges.
//!
//! [`bootstrap_with`] performs the process start-up: loading configuration
//! through [`txproc_config`], opening the reopenable log sink, installing the
//! tracing subscriber and connecting to the broker.
//!
//! ```no_run
//! use txproc_app::capabilities::{EventHandlers, EventSources, Lifecycle, LogHooks, LoopTasks};
//! use txproc_app::{StructuredHealthReporter, SystemConfigLoader, bootstrap_with};
//!
//! struct Echo;
//!
//! impl LogHooks for Echo {}
//! impl LoopTasks for Echo {}
//! impl EventSources for Echo {}
//! impl Lifecycle for Echo {}
//! impl EventHandlers for Echo {}
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = bootstrap_with("echo", &SystemConfigLoader, &StructuredHealthReporter::new())?;
//! runtime.run(Echo)?;
//! # Ok(())
//! # }
//! ```

mod bootstrap;
pub mod capabilities;
mod dispatch;
mod health;
mod log_sink;
pub mod multiplexer;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Runtime, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use capabilities::{Application, HandlerResult};
pub use dispatch::{
    Clock, DateSample, DateTracker, DispatchContext, DispatchError, Dispatcher, HandlerError,
    LoopState, SystemClock,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use log_sink::{LogReopener, LogSink, LogSinkError, LogTarget, SinkWriter};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
