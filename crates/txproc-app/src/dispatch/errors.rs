//! Error types raised by handlers and the dispatch loop.

use std::io;

use thiserror::Error;

use txproc_event::EventError;

/// Failure reported by an application handler. The pending result is marked
/// as failed with the error's message and the loop carries on.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// An event could not be read or updated.
    #[error(transparent)]
    Event(#[from] EventError),
    /// The handler rejected the request.
    #[error("{message}")]
    Failed {
        /// Text placed in the reply's error string.
        message: String,
    },
}

impl HandlerError {
    /// Builds a [`HandlerError::Failed`].
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Fatal conditions that end the dispatch loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Writing a reply to the primary output failed.
    #[error("failed to write reply frame: {source}")]
    Reply {
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The primary reader thread could not be started.
    #[error("failed to start the standard input reader: {source}")]
    Spawn {
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}
