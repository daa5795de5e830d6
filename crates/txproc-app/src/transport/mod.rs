//! Broker transport: greeting handshake and send/reply exchanges.
//!
//! Follow-up events leave the application over one of two Unix domain
//! sockets. Datagrams are fire-and-forget; the stream socket answers every
//! frame with a reply frame whose `bExpectReply` flag says whether the broker
//! will later deliver a response event.

mod broker;
mod errors;
mod greeting;

use txproc_event::Event;

pub use self::broker::BrokerLink;
pub use self::errors::{Channel, GreetingError, TransportError};
pub use self::greeting::{Greeting, parse_greeting, read_greeting};

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Result of a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The broker accepted the event and no response will follow.
    Accepted,
    /// The broker accepted the event and will deliver a response later.
    ExpectResponse,
}

/// Outbound path for follow-up events.
#[cfg_attr(test, mockall::automock)]
pub trait BrokerTransport {
    /// Serialises `event` and hands it to the broker.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the event cannot be encoded, written,
    /// or acknowledged.
    fn send(&mut self, event: &Event) -> Result<SendOutcome, TransportError>;
}

impl<T> BrokerTransport for Box<T>
where
    T: BrokerTransport + ?Sized,
{
    fn send(&mut self, event: &Event) -> Result<SendOutcome, TransportError> {
        (**self).send(event)
    }
}

/// Transport used when no broker sockets are configured. Every send fails
/// with [`TransportError::Detached`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedBroker;

impl BrokerTransport for DetachedBroker {
    fn send(&mut self, _event: &Event) -> Result<SendOutcome, TransportError> {
        Err(TransportError::Detached)
    }
}
