//! Reopenable log destination shared with the tracing subscriber.
//!
//! The sink writes to standard error or to `<log_dir>/<app_name>.log`. When
//! the configured file cannot be opened it falls back to an emergency file in
//! the system temporary directory and, failing that, to standard error. The
//! reopen-log command re-opens the configured file after external rotation.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing_subscriber::fmt::MakeWriter;

use txproc_config::Config;

/// Port through which the dispatch loop asks for the log to be re-opened.
pub trait LogReopener: Send + Sync {
    /// Re-opens the underlying log destination.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured destination could not be opened.
    /// Implementations should keep logging somewhere in that case.
    fn reopen(&self) -> Result<(), LogSinkError>;
}

impl<T> LogReopener for Arc<T>
where
    T: LogReopener + ?Sized,
{
    fn reopen(&self) -> Result<(), LogSinkError> {
        (**self).reopen()
    }
}

/// Configured destination of log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Standard error.
    Stderr,
    /// An append-only file.
    File(Utf8PathBuf),
}

impl LogTarget {
    /// Chooses the target described by `config` for `app_name`.
    #[must_use]
    pub fn from_config(config: &Config, app_name: &str) -> Self {
        if config.log_to_stderr {
            Self::Stderr
        } else {
            Self::File(config.log_file_path(app_name))
        }
    }
}

/// Errors raised while opening log files.
#[derive(Debug, Error)]
pub enum LogSinkError {
    /// The configured log file could not be opened.
    #[error("failed to open log file '{path}': {source}")]
    Open {
        /// File that failed to open.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Another thread panicked while holding the sink.
    #[error("log sink lock poisoned")]
    Poisoned,
}

#[derive(Debug)]
enum Destination {
    Stderr,
    File { file: File, path: Utf8PathBuf },
}

#[derive(Debug)]
struct SinkState {
    target: LogTarget,
    emergency: Option<Utf8PathBuf>,
    destination: Destination,
    fallback: bool,
}

/// Shared, reopenable log writer.
///
/// Cloning the sink yields another handle onto the same destination.
#[derive(Debug, Clone)]
pub struct LogSink {
    state: Arc<Mutex<SinkState>>,
}

impl LogSink {
    /// Opens `target`, falling back to `emergency` and then standard error.
    ///
    /// The returned error, when present, describes why the configured target
    /// was not used; the sink is usable either way.
    #[must_use]
    pub fn open(target: LogTarget, emergency: Option<Utf8PathBuf>) -> (Self, Option<LogSinkError>) {
        let (destination, fallback, error) = open_destination(&target, emergency.as_deref());
        let sink = Self {
            state: Arc::new(Mutex::new(SinkState {
                target,
                emergency,
                destination,
                fallback,
            })),
        };
        (sink, error)
    }

    /// Opens the sink described by `config`, using
    /// `<temp_dir>/<app_name>.log` as the emergency file.
    #[must_use]
    pub fn from_config(config: &Config, app_name: &str) -> (Self, Option<LogSinkError>) {
        Self::open(
            LogTarget::from_config(config, app_name),
            emergency_path(app_name),
        )
    }

    /// A sink that writes to standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::open(LogTarget::Stderr, None).0
    }

    /// Path of the file currently receiving log lines, if any.
    #[must_use]
    pub fn active_path(&self) -> Option<Utf8PathBuf> {
        let state = self.lock().ok()?;
        match &state.destination {
            Destination::File { path, .. } => Some(path.clone()),
            Destination::Stderr => None,
        }
    }

    /// Reports whether the sink currently writes somewhere other than its
    /// configured target.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.lock().is_ok_and(|state| state.fallback)
    }

    /// Reports whether the sink writes to standard error.
    #[must_use]
    pub fn writes_to_stderr(&self) -> bool {
        self.lock()
            .is_ok_and(|state| matches!(state.destination, Destination::Stderr))
    }

    fn lock(&self) -> Result<MutexGuard<'_, SinkState>, LogSinkError> {
        self.state.lock().map_err(|_| LogSinkError::Poisoned)
    }
}

impl LogReopener for LogSink {
    fn reopen(&self) -> Result<(), LogSinkError> {
        let mut state = self.lock()?;
        let (destination, fallback, error) =
            open_destination(&state.target, state.emergency.as_deref());
        state.destination = destination;
        state.fallback = fallback;
        error.map_or(Ok(()), Err)
    }
}

fn emergency_path(app_name: &str) -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(std::env::temp_dir())
        .ok()
        .map(|dir| dir.join(format!("{app_name}.log")))
}

fn open_destination(
    target: &LogTarget,
    emergency: Option<&Utf8Path>,
) -> (Destination, bool, Option<LogSinkError>) {
    let LogTarget::File(path) = target else {
        return (Destination::Stderr, false, None);
    };
    match append(path) {
        Ok(file) => (
            Destination::File {
                file,
                path: path.clone(),
            },
            false,
            None,
        ),
        Err(source) => {
            let error = LogSinkError::Open {
                path: path.clone(),
                source,
            };
            let destination = emergency
                .and_then(|fallback| {
                    append(fallback).ok().map(|file| Destination::File {
                        file,
                        path: fallback.to_path_buf(),
                    })
                })
                .unwrap_or(Destination::Stderr);
            (destination, true, Some(error))
        }
    }
}

fn append(path: &Utf8Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writer handed to the tracing subscriber for each log record.
#[derive(Debug)]
pub struct SinkWriter {
    state: Arc<Mutex<SinkState>>,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))?;
        match &mut state.destination {
            Destination::Stderr => io::stderr().write(buf),
            Destination::File { file, .. } => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))?;
        match &mut state.destination {
            Destination::Stderr => io::stderr().flush(),
            Destination::File { file, .. } => file.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            state: Arc::clone(&self.state),
        }
    }
}
