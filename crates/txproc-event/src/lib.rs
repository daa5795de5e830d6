//! Event model and frame codec for txProc persistent applications.
//!
//! Every message exchanged with the txProc broker is an [`Event`] made of
//! four JSON sections: a header that is always parsed, and three optional
//! sections (extended, system parameters, execution parameters) that stay as
//! raw bytes until somebody asks for them. Untouched sections are written back
//! byte for byte, so fields this crate does not understand survive a round
//! trip through an application.
//!
//! On the wire an event travels as a frame:
//!
//! ```text
//! #frameNewframe#v3.0:000126
//! 04,1,000042,1,000000,1,000014,1,000031
//! {"eventType":8,...}{"command":1,...}{...}
//! ```
//!
//! The frame header carries the protocol version and the payload length; the
//! block header lists the byte length of each section. Section payloads are
//! concatenated without separators.
//!
//! # Example
//!
//! ```rust
//! use txproc_event::{Event, EventType, ParseMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut event = Event::new(EventType::Url);
//! event.set_reference("job-17");
//! event.sys_params_mut()?.url = "https://example.com/".into();
//! event.add_param("resultQueue", "results")?;
//!
//! let frame = event.encode()?;
//! let decoded = txproc_event::decode(&frame, ParseMode::All)?;
//! assert_eq!(decoded.reference(), "job-17");
//! assert_eq!(decoded.param("resultQueue")?, "results");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod event;
pub mod kinds;

pub use self::codec::{
    BLOCK_HEADER_LEN, FRAME_HEADER_LEN, FRAME_TAG, FrameReader, MAX_PAYLOAD_LEN, PROTOCOL_VERSION,
    ParseMode, READ_BUF_SIZE, SECTION_COUNT, decode, decode_payload, encode, parse_frame_header,
};
pub use self::error::{DecodeError, EncodeError, EventError, InvalidKind, PersistError};
pub use self::event::{Event, ExecParams, Extended, Header, SectionKind, SysParams};
pub use self::kinds::{Command, EventType};
