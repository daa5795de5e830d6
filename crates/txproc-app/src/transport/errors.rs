//! Error types for broker transport operations.

use std::fmt;
use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use txproc_event::{DecodeError, EncodeError};

/// Broker socket used for an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Connectionless datagram socket.
    Datagram,
    /// Connection-oriented stream socket.
    Stream,
}

impl fmt::Display for Channel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Datagram => "datagram",
            Self::Stream => "stream",
        })
    }
}

/// Errors raised while parsing the stream greeting.
#[derive(Debug, Error)]
pub enum GreetingError {
    /// Reading the greeting failed.
    #[error("failed to read greeting: {source}")]
    Read {
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The three-digit length prefix was malformed.
    #[error("greeting length prefix '{found}' is malformed")]
    Length {
        /// Text found in place of the prefix.
        found: String,
    },
    /// A required token was missing.
    #[error("greeting '{greeting}' lacks the '{token}' token")]
    MissingToken {
        /// Token that was looked for.
        token: &'static str,
        /// Greeting text.
        greeting: String,
    },
    /// The broker speaks another protocol version.
    #[error("unsupported protocol version '{found}'")]
    UnsupportedVersion {
        /// Advertised version.
        found: String,
    },
    /// The advertised maximum datagram size was not a number.
    #[error("maximum datagram size '{found}' is not a number")]
    MaxDatagram {
        /// Advertised value.
        found: String,
    },
}

/// Errors surfaced while talking to the broker.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The event could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Writing to a broker socket failed.
    #[error("failed to write to the {channel} socket: {source}")]
    Write {
        /// Socket written to.
        channel: Channel,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The stream reply could not be read.
    #[error("failed to read the stream reply: {source}")]
    Reply {
        /// Underlying decode failure.
        #[source]
        source: DecodeError,
    },
    /// No broker sockets are configured.
    #[error("no broker connection is configured")]
    Detached,
    /// A stale local socket file could not be inspected or removed.
    #[error("failed to clean up local socket '{path}': {source}")]
    Cleanup {
        /// Local socket path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A local socket path is occupied by something other than a socket.
    #[error("local socket path '{path}' is not a socket")]
    NotSocket {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// Binding a local socket failed.
    #[error("failed to bind {channel} socket at '{path}': {source}")]
    Bind {
        /// Socket being bound.
        channel: Channel,
        /// Local path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Connecting to the broker failed.
    #[error("failed to connect {channel} socket to '{path}': {source}")]
    Connect {
        /// Socket being connected.
        channel: Channel,
        /// Broker path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The stream greeting was rejected.
    #[error(transparent)]
    Greeting(#[from] GreetingError),
}
