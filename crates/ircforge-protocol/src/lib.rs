//! Wire protocol for ircforge.
//!
//! This crate knows the shape of a single IRC line and nothing else:
//!
//! - **Types** ([`Message`], [`Peer`]): a parsed line and its origin.
//! - **Codec** ([`Message::parse`], [`Message::serialize`]): text to
//!   structure and back. Pure, stateless, no I/O.
//! - **Numerics** ([`numeric`]): names for the reply codes the client
//!   reacts to.
//! - **Errors** ([`MessageError`]): what can go wrong with one line.
//!
//! # Architecture
//!
//! ```text
//! Transport (lines) → Protocol (Message) → Session (channels, features)
//! ```

mod error;
mod message;
pub mod numeric;
mod peer;

pub use error::MessageError;
pub use message::Message;
pub use numeric::command;
pub use peer::Peer;
