//! Errors raised while building, encoding, and decoding events.
//!
//! Decode failures are fatal to one frame only; callers turn them into
//! failure replies. Accessing a section that has not been parsed yet is
//! reported as [`EventError::NotMaterialized`] rather than a panic.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::event::SectionKind;

/// A numeric wire value that does not belong to a closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} value {value} is outside the known range")]
pub struct InvalidKind {
    kind: &'static str,
    value: u32,
}

impl InvalidKind {
    pub(crate) const fn new(kind: &'static str, value: u32) -> Self {
        Self { kind, value }
    }

    /// Returns the enumeration name, for example `EventType`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Returns the rejected value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }
}

/// Errors raised by field and parameter accessors on an [`crate::Event`].
#[derive(Debug, Error)]
pub enum EventError {
    /// The section is still held as raw bytes.
    #[error("{section} section has not been materialised")]
    NotMaterialized {
        /// Section that was accessed.
        section: SectionKind,
    },

    /// The raw bytes of a section are not valid JSON for that section.
    #[error("failed to parse {section} section: {source}")]
    Section {
        /// Section that failed to parse.
        section: SectionKind,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A numeric value outside a closed enumeration.
    #[error(transparent)]
    InvalidKind(#[from] InvalidKind),

    /// A named execution parameter is not present.
    #[error("parameter '{name}' is not present")]
    MissingParam {
        /// Parameter name.
        name: String,
    },

    /// A positional execution parameter is not present.
    #[error("script parameter {index} is not present")]
    MissingScriptParam {
        /// Zero-based parameter position.
        index: usize,
    },

    /// A parameter value could not be converted to the requested type.
    #[error("parameter '{name}' value '{value}' is invalid: {message}")]
    InvalidParam {
        /// Parameter name or position.
        name: String,
        /// Raw parameter value.
        value: String,
        /// Conversion failure description.
        message: String,
    },
}

impl EventError {
    pub(crate) const fn not_materialized(section: SectionKind) -> Self {
        Self::NotMaterialized { section }
    }
}

/// Errors raised while encoding an event into a frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The frame payload does not fit the six-digit length field.
    #[error("payload of {total} bytes exceeds the {max} byte frame limit")]
    Oversized {
        /// Payload length that would have been declared.
        total: usize,
        /// Largest payload a frame can declare.
        max: usize,
    },

    /// A materialised section could not be serialised.
    #[error("failed to serialise {section} section: {source}")]
    Section {
        /// Section that failed to serialise.
        section: SectionKind,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while decoding a frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The source closed cleanly before the first byte of a frame.
    #[error("end of input")]
    Eof,

    /// Fewer bytes were available than the frame declared.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the frame required.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// The frame does not start with the frame tag.
    #[error("frame header does not start with the frame tag: {found:?}")]
    BadTag {
        /// Header bytes as text.
        found: String,
    },

    /// The frame carries a protocol version other than `3.0`.
    #[error("unsupported protocol version {found:?}")]
    UnsupportedVersion {
        /// Version text found in the header.
        found: String,
    },

    /// The frame header layout is not `tag version:NNNNNN\n`.
    #[error("malformed frame header: {found:?}")]
    MalformedFrameHeader {
        /// Header bytes as text.
        found: String,
    },

    /// The block header layout is not `NN,1,LLLLLL,...\n`.
    #[error("malformed block header: {message}")]
    MalformedBlockHeader {
        /// Description of the layout violation.
        message: String,
    },

    /// The block header declares a section count other than four.
    #[error("expected 4 sections, found {found}")]
    SectionCount {
        /// Declared section count.
        found: usize,
    },

    /// A section is tagged with a payload type other than JSON.
    #[error("{section} section has unsupported type tag {tag:?}")]
    SectionType {
        /// Section with the unknown tag.
        section: SectionKind,
        /// Tag character found.
        tag: char,
    },

    /// The header section length is zero.
    #[error("header section cannot be empty")]
    EmptyHeader,

    /// Section lengths do not add up to the payload length.
    #[error("section lengths declare {declared} payload bytes but {available} are present")]
    LengthMismatch {
        /// Block header plus declared section lengths.
        declared: usize,
        /// Payload bytes actually present.
        available: usize,
    },

    /// A section is not valid JSON for its type.
    #[error("failed to parse {section} section: {source}")]
    Section {
        /// Section that failed to parse.
        section: SectionKind,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The underlying reader failed.
    #[error("failed to read frame: {0}")]
    Io(#[source] io::Error),
}

impl DecodeError {
    /// Returns true when the source closed before a new frame started.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    pub(crate) fn block(message: impl Into<String>) -> Self {
        Self::MalformedBlockHeader {
            message: message.into(),
        }
    }
}

/// Errors raised while storing or loading an event file.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Reading or writing the file failed.
    #[error("event file {}: {source}", path.display())]
    Io {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The event could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The file does not hold a valid frame.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
