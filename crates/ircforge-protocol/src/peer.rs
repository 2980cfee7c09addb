//! Peers: the users and servers that lines come from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An actor on the network, derived from a message prefix.
///
/// Peers are plain values. Two lines from the same user produce two equal
/// but independent `Peer`s; nothing is interned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Peer {
    /// A user, known at least by nickname.
    User {
        name: String,
        ident: Option<String>,
        host: Option<String>,
    },

    /// A server announcing itself by hostname.
    Server { host: String },
}

impl Peer {
    /// Parses a prefix.
    ///
    /// - `nick!ident@host` and `nick@host` are users.
    /// - A bare token containing `.` is a server (`irc.libera.chat`).
    /// - Any other bare token is a user known only by nickname.
    pub fn parse(prefix: &str) -> Self {
        if let Some((name, rest)) = prefix.split_once('!') {
            let (ident, host) = match rest.split_once('@') {
                Some((ident, host)) => (ident, Some(host.to_string())),
                None => (rest, None),
            };
            return Self::User {
                name: name.to_string(),
                ident: Some(ident.to_string()),
                host,
            };
        }

        if let Some((name, host)) = prefix.split_once('@') {
            return Self::User {
                name: name.to_string(),
                ident: None,
                host: Some(host.to_string()),
            };
        }

        if prefix.contains('.') {
            Self::Server {
                host: prefix.to_string(),
            }
        } else {
            Self::user(prefix)
        }
    }

    /// A user known only by nickname, as in a NAMES reply.
    pub fn user(name: impl Into<String>) -> Self {
        Self::User {
            name: name.into(),
            ident: None,
            host: None,
        }
    }

    /// The nickname of a user or the hostname of a server.
    pub fn name(&self) -> &str {
        match self {
            Self::User { name, .. } => name,
            Self::Server { host } => host,
        }
    }

    pub fn ident(&self) -> Option<&str> {
        match self {
            Self::User { ident, .. } => ident.as_deref(),
            Self::Server { .. } => None,
        }
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            Self::User { host, .. } => host.as_deref(),
            Self::Server { host } => Some(host),
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Returns a copy of a user peer under a new nickname.
    pub fn renamed(&self, new_name: &str) -> Self {
        match self {
            Self::User { ident, host, .. } => Self::User {
                name: new_name.to_string(),
                ident: ident.clone(),
                host: host.clone(),
            },
            Self::Server { .. } => self.clone(),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { name, ident, host } => {
                f.write_str(name)?;
                if let Some(ident) = ident {
                    write!(f, "!{ident}")?;
                }
                if let Some(host) = host {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
            Self::Server { host } => f.write_str(host),
        }
    }
}
