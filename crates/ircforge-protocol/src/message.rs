//! A single IRC protocol line, parsed or about to be sent.
//!
//! The grammar accepted by [`Message::parse`]:
//!
//! ```text
//! line     = [ ":" prefix SPACE+ ] command *( SPACE+ middle ) [ SPACE+ ":" trailing ] SPACE*
//! command  = 3DIGIT / 1*ALPHA
//! middle   = any chars except SPACE, CR, LF, NUL; must not start with ":"
//! trailing = any chars except CR, LF, NUL (spaces allowed, may be empty)
//! ```
//!
//! Line terminators are the transport's business: `parse` expects a line
//! without its `\r\n`, and `serialize` never appends one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{MessageError, Peer};

/// One line of wire traffic.
///
/// The command is kept exactly as received (`privmsg` stays lowercase),
/// numeric replies keep their three digits as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Origin of the line: `nick!ident@host` or a server name.
    pub prefix: Option<String>,

    /// Alphabetic verb (`PRIVMSG`) or three-digit numeric (`353`).
    pub command: String,

    /// Ordered arguments. Only the last one may contain spaces.
    pub args: Vec<String>,
}

impl Message {
    /// Starts building an outbound message with no prefix and no args.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            prefix: None,
            command: command.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments in order.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the prefix. Clients rarely need this; servers and tests do.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Parses a single line (without `\r\n`).
    ///
    /// # Errors
    /// Returns [`MessageError::Malformed`] when the line breaks the
    /// grammar described in the module docs.
    pub fn parse(line: &str) -> Result<Self, MessageError> {
        if line.contains(['\0', '\r', '\n']) {
            return Err(MessageError::malformed(line, "contains CR, LF or NUL"));
        }

        let mut rest = line;
        let prefix = match rest.strip_prefix(':') {
            Some(tail) => {
                let (prefix, tail) = tail
                    .split_once(' ')
                    .ok_or_else(|| MessageError::malformed(line, "prefix without a command"))?;
                if prefix.is_empty() {
                    return Err(MessageError::malformed(line, "empty prefix"));
                }
                rest = tail.trim_start_matches(' ');
                Some(prefix.to_string())
            }
            None => None,
        };

        let (command, tail) = rest.split_once(' ').unwrap_or((rest, ""));
        if !is_valid_command(command) {
            return Err(MessageError::malformed(
                line,
                "command must be a word or three digits",
            ));
        }

        let mut args = Vec::new();
        let mut rest = tail;
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                args.push(trailing.to_string());
                break;
            }
            let (arg, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            args.push(arg.to_string());
            rest = tail;
        }

        Ok(Self {
            prefix,
            command: command.to_string(),
            args,
        })
    }

    /// Renders the message as a wire line, without the terminator.
    ///
    /// The final argument gets a leading `:` if and only if it is empty,
    /// contains a space, or itself starts with `:`.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Checks that the message can be written to the wire unchanged.
    ///
    /// Every outbound message goes through this before it reaches the
    /// transport, so user text can never smuggle in a second line.
    ///
    /// # Errors
    /// Returns [`MessageError::InvalidArgument`] naming the first bad
    /// argument, or [`MessageError::Malformed`] for a bad command/prefix.
    pub fn validate(&self) -> Result<(), MessageError> {
        if !is_valid_command(&self.command) {
            return Err(MessageError::malformed(
                &self.command,
                "command must be a word or three digits",
            ));
        }
        if let Some(prefix) = &self.prefix {
            if prefix.is_empty() || prefix.contains([' ', '\0', '\r', '\n']) {
                return Err(MessageError::malformed(prefix, "invalid prefix"));
            }
        }

        let last = self.args.len().saturating_sub(1);
        for (i, arg) in self.args.iter().enumerate() {
            let reason = if arg.contains(['\0', '\r', '\n']) {
                Some("contains CR, LF or NUL")
            } else if i == last {
                None
            } else if arg.is_empty() {
                Some("only the last argument may be empty")
            } else if arg.contains(' ') {
                Some("only the last argument may contain spaces")
            } else if arg.starts_with(':') {
                Some("only the last argument may start with ':'")
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(MessageError::InvalidArgument {
                    command: self.command.clone(),
                    arg: arg.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Returns the argument at `index`, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Returns the last argument, which for most commands is the text.
    pub fn trailing(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }

    /// `true` for three-digit reply codes.
    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit())
    }

    /// Parses the prefix into a [`Peer`]. Each call yields a fresh value.
    pub fn source(&self) -> Option<Peer> {
        self.prefix.as_deref().map(Peer::parse)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;

        if let Some((last, init)) = self.args.split_last() {
            for arg in init {
                write!(f, " {arg}")?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Message {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_valid_command(command: &str) -> bool {
    let numeric = command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit());
    let word = !command.is_empty() && command.bytes().all(|b| b.is_ascii_alphabetic());
    numeric || word
}
