//! # ircforge
//!
//! An async IRC client core for bots.
//!
//! A [`Client`] owns one connection. It registers, answers keep-alives,
//! keeps a [`Session`](ircforge_session::Session) of joined channels and
//! server features up to date, and matches multi-line server replies to
//! the command that caused them. Callers get async operations
//! ([`Client::join`], [`Client::whois`], [`Client::say`], ...) and pull
//! normalized [`Event`]s with [`Client::read_event`].
//!
//! ```rust,no_run
//! use ircforge::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let mut network = Network::new("libera", Server::new("irc.libera.chat", 6667), "forgebot");
//! network.autojoins.push("#ircforge".into());
//!
//! let client = Client::new(network, ClientConfig::default());
//! client.connect().await?;
//! while let Ok(event) = client.read_event().await {
//!     if let Event::Message { text, .. } = &event {
//!         if let Some(target) = event.reply_target() {
//!             client.say(target, text).await?;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Transport (lines) → Protocol (Message) → Client task → Session (state)
//!                                              ↓
//!                                     read_event() → Event
//! ```

mod actor;
mod client;
mod config;
mod correlation;
mod error;
mod event;

pub use client::Client;
pub use config::{ClientConfig, Network, Server};
pub use correlation::Expect;
pub use error::ClientError;
pub use event::{Event, MessageKind, Target};

pub use ircforge_protocol::{Message, MessageError, Peer, command, numeric};
pub use ircforge_session::{Channel, ChannelModes, ConnectionState, Features, Member, Topic};
pub use ircforge_transport::{BoxedStream, Connector, Endpoint, TcpConnector, TransportError};

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::{
        Channel, Client, ClientConfig, ClientError, ConnectionState, Event, Expect, Message,
        MessageKind, Network, Peer, Server, Target,
    };
}
