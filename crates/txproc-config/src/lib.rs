//! Layered configuration for txProc persistent applications.
//!
//! Values resolve in increasing precedence from built-in defaults, a TOML
//! configuration file, `TXPROC_*` environment variables and finally command
//! line flags. The resolved [`Config`] names the broker socket paths, where
//! log output goes and how the dispatch loop schedules date-driven work.

mod defaults;
mod logging;
mod paths;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_DIR, DEFAULT_LOG_FILTER, default_log_dir, default_log_filter, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use paths::{BrokerEndpoints, ConfigError, LocalSocketPaths, prepare_directory};

/// Resolved configuration for one application instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "TXPROC")]
pub struct Config {
    /// Broker-side path of the datagram socket.
    pub broker_datagram_path: Option<Utf8PathBuf>,
    /// Broker-side path of the stream socket.
    pub broker_stream_path: Option<Utf8PathBuf>,
    /// Directory for log files and local socket files.
    pub log_dir: Option<Utf8PathBuf>,
    /// Sends log output to standard error rather than a file.
    #[ortho_config(default = false)]
    pub log_to_stderr: bool,
    /// Tracing filter expression.
    pub log_filter: Option<String>,
    /// Log line format.
    pub log_format: Option<LogFormat>,
    /// Suffixes local socket paths with the process identifier.
    #[ortho_config(default = false)]
    pub append_pid: bool,
    /// Samples the clock each loop iteration to raise date roll-over flags.
    #[ortho_config(default = false)]
    pub check_date_changes: bool,
    /// Suppresses a roll-over flag when the newly sampled value is zero.
    #[ortho_config(default = false)]
    pub date_run_skip_zero: bool,
}

impl Config {
    /// Directory holding log files and local sockets.
    #[must_use]
    pub fn log_dir(&self) -> &Utf8Path {
        self.log_dir.as_deref().unwrap_or_else(|| Utf8Path::new(DEFAULT_LOG_DIR))
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Log line format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }

    /// Path of the log file for `app_name`.
    #[must_use]
    pub fn log_file_path(&self, app_name: &str) -> Utf8PathBuf {
        self.log_dir().join(format!("{app_name}.log"))
    }

    /// Broker socket paths, or `None` when the application runs detached.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IncompleteBroker`] when only one of the two
    /// paths is configured.
    pub fn broker_endpoints(&self) -> Result<Option<BrokerEndpoints>, ConfigError> {
        match (&self.broker_datagram_path, &self.broker_stream_path) {
            (None, None) => Ok(None),
            (Some(datagram), Some(stream)) => Ok(Some(BrokerEndpoints {
                datagram: datagram.clone(),
                stream: stream.clone(),
            })),
            (Some(_), None) => Err(ConfigError::IncompleteBroker {
                missing: "broker_stream_path",
            }),
            (None, Some(_)) => Err(ConfigError::IncompleteBroker {
                missing: "broker_datagram_path",
            }),
        }
    }

    /// Local bind paths for `app_name`, suffixed with `pid` when
    /// [`Config::append_pid`] is set.
    #[must_use]
    pub fn local_socket_paths(&self, app_name: &str, pid: u32) -> LocalSocketPaths {
        let suffix = self.append_pid.then_some(pid);
        LocalSocketPaths::derive(self.log_dir(), app_name, suffix)
    }
}
