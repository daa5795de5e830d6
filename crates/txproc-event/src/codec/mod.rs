//! Frame encoding and decoding.
//!
//! A frame is a 27-byte frame header, a 39-byte block header, and four JSON
//! sections concatenated without separators:
//!
//! ```text
//! #frameNewframe#v3.0:PPPPPP\n
//! 04,1,AAAAAA,1,BBBBBB,1,CCCCCC,1,DDDDDD\n
//! <header><extended><sysParams><execParams>
//! ```
//!
//! `PPPPPP` is the payload length (block header plus sections) and each of
//! `AAAAAA`..`DDDDDD` is the byte length of one section. Section boundaries are
//! computed from those lengths alone.

mod file;
mod reader;

use std::borrow::Cow;

use tracing::trace;

use crate::error::{DecodeError, EncodeError};
use crate::event::{Event, Header, Section, SectionKind};

pub use self::reader::FrameReader;

/// Literal that opens every frame.
pub const FRAME_TAG: &str = "#frameNewframe#v";
/// The only protocol version this crate speaks.
pub const PROTOCOL_VERSION: &str = "3.0";
/// Length of `#frameNewframe#v3.0:NNNNNN\n`.
pub const FRAME_HEADER_LEN: usize = 27;
/// Length of `04,1,LLLLLL,1,LLLLLL,1,LLLLLL,1,LLLLLL\n`.
pub const BLOCK_HEADER_LEN: usize = 39;
/// Largest payload a six-digit length field can declare.
pub const MAX_PAYLOAD_LEN: usize = 999_999;
/// Default maximum datagram size advertised by the broker.
pub const READ_BUF_SIZE: usize = 32_768;
/// Number of sections in every frame.
pub const SECTION_COUNT: usize = 4;

const LENGTH_DIGITS: usize = 6;
const JSON_SECTION_TAG: u8 = b'1';
const CODEC_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::codec");

/// How much of a decoded frame to parse up front.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Parse the header only; keep the other sections as raw bytes.
    #[default]
    HeaderOnly,
    /// Parse every section while decoding.
    All,
}

impl ParseMode {
    const fn is_eager(self) -> bool {
        matches!(self, Self::All)
    }
}

/// Encodes an event into a complete frame.
///
/// Sections that were never parsed or modified are emitted exactly as they
/// were received.
///
/// # Errors
///
/// Returns [`EncodeError::Oversized`] when the payload would exceed
/// [`MAX_PAYLOAD_LEN`] and [`EncodeError::Section`] when a section cannot be
/// serialised. Nothing is produced in either case.
pub fn encode(event: &Event) -> Result<Vec<u8>, EncodeError> {
    let mut sections: Vec<Cow<'_, [u8]>> = Vec::with_capacity(SECTION_COUNT);
    for section in SectionKind::ALL {
        let bytes = event
            .section_bytes(section)
            .map_err(|source| EncodeError::Section { section, source })?;
        sections.push(bytes);
    }

    let section_total: usize = sections.iter().map(|bytes| bytes.len()).sum();
    let total = BLOCK_HEADER_LEN + section_total;
    if total > MAX_PAYLOAD_LEN {
        return Err(EncodeError::Oversized {
            total,
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + total);
    frame.extend_from_slice(format!("{FRAME_TAG}{PROTOCOL_VERSION}:{total:06}\n").as_bytes());
    frame.extend_from_slice(format!("{SECTION_COUNT:02}").as_bytes());
    for bytes in &sections {
        frame.extend_from_slice(format!(",1,{:06}", bytes.len()).as_bytes());
    }
    frame.push(b'\n');
    for bytes in &sections {
        frame.extend_from_slice(bytes);
    }
    trace!(target: CODEC_TARGET, total, "encoded frame");
    Ok(frame)
}

/// Decodes one complete frame, frame header included.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first framing or section
/// violation found.
pub fn decode(frame: &[u8], mode: ParseMode) -> Result<Event, DecodeError> {
    let (header, payload) = frame
        .split_first_chunk::<FRAME_HEADER_LEN>()
        .ok_or(DecodeError::Truncated {
            expected: FRAME_HEADER_LEN,
            actual: frame.len(),
        })?;
    let declared = parse_frame_header(header)?;
    if payload.len() < declared {
        return Err(DecodeError::Truncated {
            expected: declared,
            actual: payload.len(),
        });
    }
    if payload.len() > declared {
        return Err(DecodeError::LengthMismatch {
            declared,
            available: payload.len(),
        });
    }
    decode_payload(payload, mode)
}

/// Validates a frame header and returns the declared payload length.
///
/// # Errors
///
/// Returns [`DecodeError::BadTag`], [`DecodeError::UnsupportedVersion`], or
/// [`DecodeError::MalformedFrameHeader`].
pub fn parse_frame_header(header: &[u8; FRAME_HEADER_LEN]) -> Result<usize, DecodeError> {
    let text = || String::from_utf8_lossy(header).into_owned();
    let after_tag = header
        .strip_prefix(FRAME_TAG.as_bytes())
        .ok_or_else(|| DecodeError::BadTag { found: text() })?;
    let (version, length_field) = after_tag
        .split_at_checked(PROTOCOL_VERSION.len())
        .ok_or_else(|| DecodeError::MalformedFrameHeader { found: text() })?;
    if version != PROTOCOL_VERSION.as_bytes() {
        return Err(DecodeError::UnsupportedVersion {
            found: String::from_utf8_lossy(version).into_owned(),
        });
    }
    let digits = length_field
        .strip_prefix(b":")
        .and_then(|tail| tail.strip_suffix(b"\n"))
        .ok_or_else(|| DecodeError::MalformedFrameHeader { found: text() })?;
    parse_digits(digits).ok_or_else(|| DecodeError::MalformedFrameHeader { found: text() })
}

/// Decodes the payload that follows a frame header.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the block header is malformed, when the
/// declared section lengths do not add up to the payload, or when a parsed
/// section is not valid JSON.
pub fn decode_payload(payload: &[u8], mode: ParseMode) -> Result<Event, DecodeError> {
    let lengths = parse_block_header(payload)?;
    let [header_len, ..] = lengths;
    if header_len == 0 {
        return Err(DecodeError::EmptyHeader);
    }

    let declared = lengths
        .iter()
        .try_fold(BLOCK_HEADER_LEN, |sum, len| sum.checked_add(*len))
        .ok_or_else(|| DecodeError::block("section lengths overflow"))?;
    if declared != payload.len() {
        return Err(DecodeError::LengthMismatch {
            declared,
            available: payload.len(),
        });
    }

    let mut offset = BLOCK_HEADER_LEN;
    let mut spans: [&[u8]; SECTION_COUNT] = [&[]; SECTION_COUNT];
    for (span, len) in spans.iter_mut().zip(lengths) {
        *span = payload
            .get(offset..offset + len)
            .ok_or(DecodeError::LengthMismatch {
                declared,
                available: payload.len(),
            })?;
        offset += len;
    }
    let [header_bytes, extended_bytes, sys_bytes, exec_bytes] = spans;

    let header: Header =
        serde_json::from_slice(header_bytes).map_err(|source| DecodeError::Section {
            section: SectionKind::Header,
            source,
        })?;
    let eager = mode.is_eager();
    let event = Event::from_parts(
        header,
        header_bytes.to_vec(),
        Section::from_wire(extended_bytes, eager).map_err(section_error(SectionKind::Extended))?,
        Section::from_wire(sys_bytes, eager).map_err(section_error(SectionKind::SysParams))?,
        Section::from_wire(exec_bytes, eager).map_err(section_error(SectionKind::ExecParams))?,
    );
    trace!(
        target: CODEC_TARGET,
        header = header_len,
        extended = extended_bytes.len(),
        sys_params = sys_bytes.len(),
        exec_params = exec_bytes.len(),
        "decoded frame"
    );
    Ok(event)
}

fn section_error(section: SectionKind) -> impl FnOnce(serde_json::Error) -> DecodeError {
    move |source| DecodeError::Section { section, source }
}

/// Parses `04,1,LLLLLL,1,LLLLLL,1,LLLLLL,1,LLLLLL\n`.
fn parse_block_header(payload: &[u8]) -> Result<[usize; SECTION_COUNT], DecodeError> {
    let (block, _) = payload
        .split_first_chunk::<BLOCK_HEADER_LEN>()
        .ok_or(DecodeError::Truncated {
            expected: BLOCK_HEADER_LEN,
            actual: payload.len(),
        })?;
    let (count_digits, mut rest) = block.split_at(2);
    let count = parse_digits(count_digits)
        .ok_or_else(|| DecodeError::block("section count is not numeric"))?;
    if count != SECTION_COUNT {
        return Err(DecodeError::SectionCount { found: count });
    }

    let mut lengths = [0_usize; SECTION_COUNT];
    for (slot, section) in lengths.iter_mut().zip(SectionKind::ALL) {
        let Some((&[b',', tag, b','], tail)) = rest.split_first_chunk::<3>() else {
            return Err(DecodeError::block(format!("missing separators before {section}")));
        };
        if tag != JSON_SECTION_TAG {
            return Err(DecodeError::SectionType {
                section,
                tag: char::from(tag),
            });
        }
        let (digits, tail) = tail
            .split_at_checked(LENGTH_DIGITS)
            .ok_or_else(|| DecodeError::block(format!("missing length for {section}")))?;
        *slot = parse_digits(digits)
            .ok_or_else(|| DecodeError::block(format!("{section} length is not numeric")))?;
        rest = tail;
    }
    if rest != b"\n" {
        return Err(DecodeError::block("block header is not newline terminated"));
    }
    Ok(lengths)
}

fn parse_digits(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

impl Event {
    /// Encodes the event into a frame. See [`encode`].
    ///
    /// # Errors
    ///
    /// Returns the errors of [`encode`].
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        encode(self)
    }
}
