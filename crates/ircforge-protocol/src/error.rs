//! Error types for the protocol layer.
//!
//! Each crate in ircforge defines its own error enum. A `MessageError`
//! always means the problem is in the text of a single line, never in
//! the connection that carried it.

/// Errors that can occur while parsing or building a [`Message`](crate::Message).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The line does not match the IRC message grammar.
    ///
    /// The read loop logs and skips these; one bad line never ends a
    /// session.
    #[error("malformed message {line:?}: {reason}")]
    Malformed {
        /// The offending line, without its terminator.
        line: String,
        /// Which grammar rule the line broke.
        reason: &'static str,
    },

    /// An outbound message carries an argument that cannot be put on
    /// the wire (a line break, a NUL, or a space in a non-final slot).
    #[error("invalid argument {arg:?} for {command}: {reason}")]
    InvalidArgument {
        /// The command being built.
        command: String,
        /// The argument that was rejected.
        arg: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl MessageError {
    pub(crate) fn malformed(line: &str, reason: &'static str) -> Self {
        Self::Malformed {
            line: line.to_string(),
            reason,
        }
    }
}
