//! Unix domain socket connection pair to the broker.

use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixDatagram, UnixStream};

use camino::Utf8Path;
use socket2::{Domain, SockAddr, Socket, Type};
use tracing::{debug, warn};

use txproc_config::{BrokerEndpoints, LocalSocketPaths};
use txproc_event::{Event, FrameReader};

use super::{
    BrokerTransport, Channel, Greeting, SendOutcome, TRANSPORT_TARGET, TransportError,
    read_greeting,
};

/// Datagram and stream connections to the broker.
///
/// Events whose `returnFd` is `"0"`, and events too large for one datagram,
/// travel on the stream socket; everything else is sent as a datagram. Local
/// socket files are removed when the link is dropped.
#[derive(Debug)]
pub struct BrokerLink {
    datagram: UnixDatagram,
    stream: UnixStream,
    max_datagram: usize,
    local: Option<LocalSocketPaths>,
}

impl BrokerLink {
    /// Binds both local sockets, dials the broker and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when a local path is occupied, binding or
    /// connecting fails, or the greeting is rejected.
    pub fn connect(
        remote: &BrokerEndpoints,
        local: &LocalSocketPaths,
    ) -> Result<(Self, Greeting), TransportError> {
        remove_stale(&local.datagram)?;
        remove_stale(&local.stream)?;

        let datagram =
            UnixDatagram::bind(local.datagram.as_std_path()).map_err(|source| {
                TransportError::Bind {
                    channel: Channel::Datagram,
                    path: local.datagram.clone(),
                    source,
                }
            })?;
        datagram
            .connect(remote.datagram.as_std_path())
            .map_err(|source| TransportError::Connect {
                channel: Channel::Datagram,
                path: remote.datagram.clone(),
                source,
            })?;

        let mut stream = connect_stream(local.stream.as_path(), remote.stream.as_path())?;
        let greeting = read_greeting(&mut stream)?;

        debug!(
            target: TRANSPORT_TARGET,
            local_datagram = %local.datagram,
            local_stream = %local.stream,
            remote_datagram = %remote.datagram,
            remote_stream = %remote.stream,
            "broker sockets connected"
        );

        let link = Self {
            datagram,
            stream,
            max_datagram: greeting.max_datagram(),
            local: Some(local.clone()),
        };
        Ok((link, greeting))
    }

    /// Wraps already connected sockets.
    #[must_use]
    pub const fn from_sockets(datagram: UnixDatagram, stream: UnixStream, max_datagram: usize) -> Self {
        Self {
            datagram,
            stream,
            max_datagram,
            local: None,
        }
    }

    /// Largest frame sent as a datagram.
    #[must_use]
    pub const fn max_datagram(&self) -> usize {
        self.max_datagram
    }

    fn post(&self, frame: &[u8]) -> Result<SendOutcome, TransportError> {
        let written = self
            .datagram
            .send(frame)
            .map_err(|source| TransportError::Write {
                channel: Channel::Datagram,
                source,
            })?;
        if written != frame.len() {
            warn!(
                target: TRANSPORT_TARGET,
                written,
                expected = frame.len(),
                "short datagram write"
            );
        }
        Ok(SendOutcome::Accepted)
    }
}

impl BrokerTransport for BrokerLink {
    fn send(&mut self, event: &Event) -> Result<SendOutcome, TransportError> {
        let frame = event.encode()?;
        if event.awaits_stream_reply() || frame.len() > self.max_datagram {
            exchange(&mut self.stream, &frame)
        } else {
            self.post(&frame)
        }
    }
}

impl Drop for BrokerLink {
    fn drop(&mut self) {
        let Some(local) = self.local.take() else {
            return;
        };
        for path in [&local.datagram, &local.stream] {
            if let Err(error) = fs::remove_file(path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: TRANSPORT_TARGET,
                    path = %path,
                    error = %error,
                    "failed to remove local socket"
                );
            }
        }
    }
}

/// Writes one frame on a stream and reads the broker's reply frame.
pub(super) fn exchange<S>(stream: &mut S, frame: &[u8]) -> Result<SendOutcome, TransportError>
where
    S: Read + Write,
{
    stream
        .write_all(frame)
        .and_then(|()| stream.flush())
        .map_err(|source| TransportError::Write {
            channel: Channel::Stream,
            source,
        })?;

    let reply = FrameReader::new(&mut *stream)
        .read_event()
        .map_err(|source| TransportError::Reply { source })?;
    debug!(target: TRANSPORT_TARGET, reply = %reply, "stream reply received");
    if reply.expect_reply().unwrap_or_default() {
        Ok(SendOutcome::ExpectResponse)
    } else {
        Ok(SendOutcome::Accepted)
    }
}

fn connect_stream(local: &Utf8Path, remote: &Utf8Path) -> Result<UnixStream, TransportError> {
    let bind_error = |source| TransportError::Bind {
        channel: Channel::Stream,
        path: local.to_path_buf(),
        source,
    };
    let connect_error = |source| TransportError::Connect {
        channel: Channel::Stream,
        path: remote.to_path_buf(),
        source,
    };

    let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(bind_error)?;
    let local_address = SockAddr::unix(local.as_std_path()).map_err(bind_error)?;
    socket.bind(&local_address).map_err(bind_error)?;
    let remote_address = SockAddr::unix(remote.as_std_path()).map_err(connect_error)?;
    socket.connect(&remote_address).map_err(connect_error)?;
    Ok(socket.into())
}

fn remove_stale(path: &Utf8Path) -> Result<(), TransportError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(TransportError::Cleanup {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.file_type().is_socket() {
        return Err(TransportError::NotSocket {
            path: path.to_path_buf(),
        });
    }
    fs::remove_file(path).map_err(|source| TransportError::Cleanup {
        path: path.to_path_buf(),
        source,
    })
}
