//! Process bootstrap: configuration, logging, and the broker connection.

use std::io::{self, Write};
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::{info, warn};

use txproc_config::{Config, ConfigError, prepare_directory};

use crate::capabilities::Application;
use crate::dispatch::{DateTracker, DispatchError, Dispatcher};
use crate::health::HealthReporter;
use crate::log_sink::LogSink;
use crate::multiplexer::Multiplexer;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{BrokerLink, BrokerTransport, DetachedBroker, TransportError};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the application configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Broker paths are inconsistent.
    #[error("invalid broker configuration: {source}")]
    Broker {
        /// Validation error.
        #[source]
        source: ConfigError,
    },
    /// The local socket directory could not be prepared.
    #[error("failed to prepare local socket directory: {source}")]
    Socket {
        /// Filesystem error reported while preparing the directory.
        #[source]
        source: ConfigError,
    },
    /// Dialling the broker failed.
    #[error("failed to connect to the broker: {source}")]
    Connect {
        /// Transport error.
        #[source]
        source: TransportError,
    },
}

/// A bootstrapped application process, ready to run its dispatch loop.
pub struct Runtime {
    app_name: String,
    config: Config,
    sink: LogSink,
    telemetry: TelemetryHandle,
    broker: Box<dyn BrokerTransport>,
    multiplexer: Multiplexer,
}

impl Runtime {
    /// Name the process was bootstrapped as.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Log sink the tracing subscriber writes to.
    #[must_use]
    pub const fn log_sink(&self) -> &LogSink {
        &self.sink
    }

    /// Multiplexer the dispatch loop will read from. Extension sources are
    /// registered here before [`Runtime::run`].
    pub const fn multiplexer_mut(&mut self) -> &mut Multiplexer {
        &mut self.multiplexer
    }

    /// Builds the dispatch loop for `app`, writing replies to `output`.
    ///
    /// The log sink is installed as the reopen target and the date tracker
    /// is enabled when `check_date_changes` is set. No primary reader is
    /// started.
    pub fn into_dispatcher<A, W>(
        self,
        app: A,
        output: W,
    ) -> Dispatcher<A, Box<dyn BrokerTransport>, W>
    where
        A: Application,
        W: Write,
    {
        let dispatcher = Dispatcher::new(self.app_name, app, self.broker, output, self.multiplexer)
            .with_log_reopener(Arc::new(self.sink));
        if self.config.check_date_changes {
            dispatcher.with_date_tracker(DateTracker::system(self.config.date_run_skip_zero))
        } else {
            dispatcher
        }
    }

    /// Reads requests from standard input and writes replies to standard
    /// output until told to exit.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] when the standard input reader cannot
    /// be started and [`DispatchError::Reply`] when a reply cannot be written.
    pub fn run<A>(self, app: A) -> Result<(), DispatchError>
    where
        A: Application,
    {
        self.multiplexer
            .spawn_stdin()
            .map_err(|source| DispatchError::Spawn { source })?;
        self.into_dispatcher(app, io::stdout()).run()
    }
}

/// Bootstraps `app_name` using the supplied collaborators.
///
/// The sequence is: load configuration, open the log sink, initialise
/// telemetry, then connect to the broker when both broker paths are set. With
/// neither path set the process runs detached and follow-up events are
/// dropped.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first step that fails. The reporter is
/// told about the failure before it is returned.
pub fn bootstrap_with(
    app_name: &str,
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
) -> Result<Runtime, BootstrapError> {
    reporter.bootstrap_starting();
    bootstrap_steps(app_name, loader, reporter)
        .inspect(|runtime| reporter.bootstrap_succeeded(runtime.config()))
        .inspect_err(|error| reporter.bootstrap_failed(error))
}

fn bootstrap_steps(
    app_name: &str,
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
) -> Result<Runtime, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;

    let directory_error = if config.log_to_stderr {
        None
    } else {
        prepare_directory(config.log_dir()).err()
    };
    let (sink, sink_error) = LogSink::from_config(&config, app_name);
    let telemetry = telemetry::initialise(&config, &sink)
        .map_err(|source| BootstrapError::Telemetry { source })?;
    if let Some(error) = directory_error {
        warn!(target: BOOTSTRAP_TARGET, error = %error, "log directory unavailable");
    }
    if let Some(error) = sink_error {
        warn!(
            target: BOOTSTRAP_TARGET,
            error = %error,
            active = ?sink.active_path(),
            "configured log file unavailable; using fallback"
        );
    }

    let broker = connect_broker(app_name, &config, reporter)?;
    info!(target: BOOTSTRAP_TARGET, app = app_name, "bootstrap complete");

    Ok(Runtime {
        app_name: app_name.to_owned(),
        config,
        sink,
        telemetry,
        broker,
        multiplexer: Multiplexer::default(),
    })
}

fn connect_broker(
    app_name: &str,
    config: &Config,
    reporter: &dyn HealthReporter,
) -> Result<Box<dyn BrokerTransport>, BootstrapError> {
    let Some(endpoints) = config
        .broker_endpoints()
        .map_err(|source| BootstrapError::Broker { source })?
    else {
        reporter.broker_detached();
        return Ok(Box::new(DetachedBroker));
    };

    reporter.broker_connecting(&endpoints);
    let local = config.local_socket_paths(app_name, std::process::id());
    local
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;

    match BrokerLink::connect(&endpoints, &local) {
        Ok((link, greeting)) => {
            reporter.broker_connected(&greeting);
            Ok(Box::new(link))
        }
        Err(source) => {
            reporter.broker_failed(&source);
            Err(BootstrapError::Connect { source })
        }
    }
}
