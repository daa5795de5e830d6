//! Stream greeting handshake.
//!
//! After a stream connection is accepted the broker sends
//! `<3-digit length>:<text>` where the text contains `pver <version>` and
//! `md <max datagram size>`, for example `032:txProc@host pver 3.0 md 32768`.

use std::io::Read;

use txproc_event::PROTOCOL_VERSION;

use super::{GreetingError, TRANSPORT_TARGET};

const PREFIX_LEN: usize = 4;
const VERSION_TOKEN: &str = "pver ";
const MAX_DATAGRAM_TOKEN: &str = "md ";

/// Parameters advertised by the broker's greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    banner: String,
    protocol_version: String,
    max_datagram: usize,
}

impl Greeting {
    /// Complete greeting text after the length prefix.
    #[must_use]
    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Advertised protocol version.
    #[must_use]
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Largest datagram the broker accepts.
    #[must_use]
    pub const fn max_datagram(&self) -> usize {
        self.max_datagram
    }
}

/// Reads and validates the greeting from a freshly connected stream.
///
/// # Errors
///
/// Returns [`GreetingError`] for I/O failures, a malformed prefix, missing
/// tokens, or an unsupported protocol version.
pub fn read_greeting(reader: &mut impl Read) -> Result<Greeting, GreetingError> {
    let mut prefix = [0_u8; PREFIX_LEN];
    reader
        .read_exact(&mut prefix)
        .map_err(|source| GreetingError::Read { source })?;
    let length = parse_prefix(&prefix)?;

    let mut text = vec![0_u8; length];
    reader
        .read_exact(&mut text)
        .map_err(|source| GreetingError::Read { source })?;
    let greeting = parse_greeting(&String::from_utf8_lossy(&text))?;
    tracing::info!(
        target: TRANSPORT_TARGET,
        protocol_version = %greeting.protocol_version,
        max_datagram = greeting.max_datagram,
        "broker greeting received"
    );
    Ok(greeting)
}

fn parse_prefix(prefix: &[u8; PREFIX_LEN]) -> Result<usize, GreetingError> {
    let malformed = || GreetingError::Length {
        found: String::from_utf8_lossy(prefix).into_owned(),
    };
    let [digits @ .., b':'] = prefix else {
        return Err(malformed());
    };
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(malformed)
}

/// Parses the greeting text that follows the length prefix.
///
/// # Errors
///
/// Returns [`GreetingError`] when a token is missing, the version differs
/// from the supported protocol version, or the datagram size is not numeric.
pub fn parse_greeting(text: &str) -> Result<Greeting, GreetingError> {
    let missing = |token| GreetingError::MissingToken {
        token,
        greeting: text.to_owned(),
    };

    let after_version = text
        .find(VERSION_TOKEN)
        .and_then(|index| text.get(index + VERSION_TOKEN.len()..))
        .ok_or_else(|| missing(VERSION_TOKEN))?;
    let version = after_version
        .get(..PROTOCOL_VERSION.len())
        .unwrap_or(after_version);
    if version != PROTOCOL_VERSION {
        return Err(GreetingError::UnsupportedVersion {
            found: version.to_owned(),
        });
    }

    let size_text = text
        .find(MAX_DATAGRAM_TOKEN)
        .and_then(|index| text.get(index + MAX_DATAGRAM_TOKEN.len()..))
        .ok_or_else(|| missing(MAX_DATAGRAM_TOKEN))?
        .trim();
    let digits = size_text
        .split(|character: char| !character.is_ascii_digit())
        .next()
        .unwrap_or_default();
    let max_datagram = digits
        .parse()
        .map_err(|_| GreetingError::MaxDatagram {
            found: size_text.to_owned(),
        })?;

    Ok(Greeting {
        banner: text.trim_end().to_owned(),
        protocol_version: version.to_owned(),
        max_datagram,
    })
}
