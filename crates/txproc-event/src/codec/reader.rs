//! Blocking frame reader over any byte stream.

use std::io::{self, Read};

use super::{FRAME_HEADER_LEN, ParseMode, decode_payload, parse_frame_header};
use crate::error::DecodeError;
use crate::event::Event;

/// Reads consecutive frames from a byte stream such as standard input or a
/// stream socket.
///
/// A stream that ends before the first byte of a frame yields
/// [`DecodeError::Eof`]; a stream that ends part way through a frame yields
/// [`DecodeError::Truncated`].
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    mode: ParseMode,
}

impl<R: Read> FrameReader<R> {
    /// Wraps a reader, parsing every section of each frame.
    pub const fn new(inner: R) -> Self {
        Self::with_mode(inner, ParseMode::All)
    }

    /// Wraps a reader with an explicit parse mode.
    pub const fn with_mode(inner: R, mode: ParseMode) -> Self {
        Self { inner, mode }
    }

    /// Returns the wrapped reader.
    pub const fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwraps the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads and decodes the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Eof`] at a clean end of stream, and any framing
    /// or I/O failure otherwise.
    pub fn read_event(&mut self) -> Result<Event, DecodeError> {
        let payload = self.read_payload()?;
        decode_payload(&payload, self.mode)
    }

    /// Reads the next frame and returns its payload without decoding it.
    ///
    /// # Errors
    ///
    /// Same as [`FrameReader::read_event`], minus section errors.
    pub fn read_payload(&mut self) -> Result<Vec<u8>, DecodeError> {
        let mut header = [0_u8; FRAME_HEADER_LEN];
        let header_read = fill(&mut self.inner, &mut header).map_err(DecodeError::Io)?;
        if header_read == 0 {
            return Err(DecodeError::Eof);
        }
        if header_read < FRAME_HEADER_LEN {
            return Err(DecodeError::Truncated {
                expected: FRAME_HEADER_LEN,
                actual: header_read,
            });
        }

        let declared = parse_frame_header(&header)?;
        let mut payload = vec![0_u8; declared];
        let payload_read = fill(&mut self.inner, &mut payload).map_err(DecodeError::Io)?;
        if payload_read < declared {
            return Err(DecodeError::Truncated {
                expected: declared,
                actual: payload_read,
            });
        }
        Ok(payload)
    }
}

/// Reads until `buf` is full or the stream ends; returns the bytes read.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while let Some(remaining) = buf.get_mut(filled..) {
        if remaining.is_empty() {
            break;
        }
        match reader.read(remaining) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
    Ok(filled)
}
