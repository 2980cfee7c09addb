//! Unified error type for the ircforge client.

use ircforge_protocol::{Message, MessageError};
use ircforge_transport::TransportError;

/// Everything a client operation can fail with.
///
/// Sub-crate errors convert through `#[from]`, so `?` works across the
/// layers. Protocol-level refusals carry the server's reply verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport could not be opened, or failed while open.
    #[error(transparent)]
    Connection(#[from] TransportError),

    /// A line could not be parsed, or an outbound message is illegal.
    #[error(transparent)]
    Malformed(#[from] MessageError),

    /// The server answered with an error reply.
    #[error("server refused: {0}")]
    Protocol(Box<Message>),

    /// An operation did not complete within its configured bound.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// The connection ended before the server welcomed us.
    #[error("registration failed: {0}")]
    Registration(String),

    /// The operation needs a live connection and there is none.
    #[error("not connected")]
    NotConnected,

    /// The connection closed while the operation was pending.
    #[error("connection closed")]
    Closed,

    /// The network configuration cannot be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn protocol(msg: &Message) -> Self {
        Self::Protocol(Box::new(msg.clone()))
    }

    /// The server reply behind a [`Protocol`](Self::Protocol) error.
    pub fn reply(&self) -> Option<&Message> {
        match self {
            Self::Protocol(msg) => Some(msg),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Connection(_)));
        assert!(client_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_message_error() {
        let err = Message::parse("").unwrap_err();
        let client_err: ClientError = err.into();
        assert!(matches!(client_err, ClientError::Malformed(_)));
    }

    #[test]
    fn test_protocol_error_exposes_reply() {
        let reply = Message::parse(":irc.example.net 401 bot ghost :No such nick").unwrap();
        let err = ClientError::protocol(&reply);
        assert_eq!(err.reply().map(|m| m.command.as_str()), Some("401"));
        assert!(err.to_string().contains("No such nick"));
        assert!(ClientError::Closed.reply().is_none());
    }
}
