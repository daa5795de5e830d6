//! Funnels frames from every event source onto one channel.
//!
//! Each source is read on its own thread. Records carry the [`SourceId`] of
//! their origin so the dispatch loop can tell the primary source (standard
//! input, id 0) from extension sources without knowing how they are read.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::{debug, info, warn};

use txproc_event::{DecodeError, Event, FrameReader};

const MULTIPLEXER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::multiplexer");

/// Identifier of an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(u32);

impl SourceId {
    /// Standard input, the primary source.
    pub const STDIN: Self = Self(0);

    /// Numeric identifier.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Reports whether this is the primary source.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        self.0 == Self::STDIN.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "source-{}", self.0)
    }
}

/// One decoded frame, or the error met while reading it, tagged by origin.
#[derive(Debug)]
pub struct SourceRecord {
    /// Source the record came from.
    pub source: SourceId,
    /// Decoded event or read failure.
    pub payload: Result<Event, DecodeError>,
}

impl SourceRecord {
    /// Reports whether the record marks the clean end of its source.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(&self.payload, Err(error) if error.is_eof())
    }
}

/// Cooperative termination flag shared by the loop and every reader.
#[derive(Debug, Clone, Default)]
pub struct TerminationFlag(Arc<AtomicBool>);

impl TerminationFlag {
    /// Creates a cleared flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Reports whether termination has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handle through which an extension source delivers records.
#[derive(Debug, Clone)]
pub struct SourceSender {
    id: SourceId,
    sender: Sender<SourceRecord>,
}

impl SourceSender {
    /// Identifier records are tagged with.
    #[must_use]
    pub const fn id(&self) -> SourceId {
        self.id
    }

    /// Delivers a record; returns `false` once the loop has gone away.
    pub fn deliver(&self, payload: Result<Event, DecodeError>) -> bool {
        self.sender
            .send(SourceRecord {
                source: self.id,
                payload,
            })
            .is_ok()
    }
}

/// Owner of the shared channel and the source id counter.
#[derive(Debug)]
pub struct Multiplexer {
    sender: Sender<SourceRecord>,
    receiver: Receiver<SourceRecord>,
    next_id: u32,
    termination: TerminationFlag,
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new(TerminationFlag::new())
    }
}

impl Multiplexer {
    /// Creates a multiplexer sharing `termination` with its readers.
    #[must_use]
    pub fn new(termination: TerminationFlag) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            next_id: SourceId::STDIN.0 + 1,
            termination,
        }
    }

    /// Flag shared with every reader thread.
    #[must_use]
    pub const fn termination(&self) -> &TerminationFlag {
        &self.termination
    }

    /// Hands out the next source id together with a sender for it.
    pub fn register_source(&mut self) -> SourceSender {
        let id = SourceId(self.next_id);
        self.next_id += 1;
        debug!(target: MULTIPLEXER_TARGET, source = %id, "source registered");
        SourceSender {
            id,
            sender: self.sender.clone(),
        }
    }

    /// Sender tagging records as coming from the primary source.
    #[must_use]
    pub fn primary_sender(&self) -> SourceSender {
        SourceSender {
            id: SourceId::STDIN,
            sender: self.sender.clone(),
        }
    }

    /// Starts the primary reader on standard input.
    ///
    /// # Errors
    ///
    /// Returns the error raised when the reader thread cannot be spawned.
    pub fn spawn_stdin(&self) -> io::Result<()> {
        self.spawn_primary(io::stdin())
    }

    /// Starts the primary reader on an arbitrary byte stream.
    ///
    /// # Errors
    ///
    /// Returns the error raised when the reader thread cannot be spawned.
    pub fn spawn_primary<R>(&self, reader: R) -> io::Result<()>
    where
        R: Read + Send + 'static,
    {
        spawn_reader(self.primary_sender(), reader, self.termination.clone())
    }

    /// Registers a new source and starts a reader thread decoding frames
    /// from `reader`.
    ///
    /// # Errors
    ///
    /// Returns the error raised when the reader thread cannot be spawned.
    pub fn spawn_frame_source<R>(&mut self, reader: R) -> io::Result<SourceId>
    where
        R: Read + Send + 'static,
    {
        let sender = self.register_source();
        let id = sender.id();
        spawn_reader(sender, reader, self.termination.clone())?;
        Ok(id)
    }

    /// Blocks until the next record arrives.
    pub fn recv(&self) -> Option<SourceRecord> {
        self.receiver.recv().ok()
    }
}

fn spawn_reader<R>(sender: SourceSender, reader: R, termination: TerminationFlag) -> io::Result<()>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("txproc-{}", sender.id()))
        .spawn(move || pump(&sender, reader, &termination))
        .map(drop)
}

/// Decodes frames until the stream ends, the loop terminates, or the channel
/// closes. A read failure is forwarded and followed by an end-of-stream
/// record, since the stream position is lost.
fn pump<R: Read>(sender: &SourceSender, reader: R, termination: &TerminationFlag) {
    let mut frames = FrameReader::new(reader);
    while !termination.is_requested() {
        let payload = frames.read_event();
        let (stop, io_failure) = match &payload {
            Ok(event) => {
                debug!(target: MULTIPLEXER_TARGET, source = %sender.id(), event = %event, "frame received");
                (false, false)
            }
            Err(DecodeError::Eof) => {
                info!(target: MULTIPLEXER_TARGET, source = %sender.id(), "end of stream");
                (true, false)
            }
            Err(DecodeError::Io(error)) => {
                warn!(target: MULTIPLEXER_TARGET, source = %sender.id(), error = %error, "read failed");
                (true, true)
            }
            Err(error) => {
                warn!(target: MULTIPLEXER_TARGET, source = %sender.id(), error = %error, "undecodable frame");
                (false, false)
            }
        };
        if !sender.deliver(payload) {
            return;
        }
        if io_failure {
            sender.deliver(Err(DecodeError::Eof));
        }
        if stop {
            return;
        }
    }
}
