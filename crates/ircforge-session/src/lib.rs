//! Session state for ircforge.
//!
//! Everything the client learns from the server lives here:
//!
//! 1. **Lifecycle**: where the connection stands ([`ConnectionState`])
//! 2. **Features**: limits and grammar the server advertised in its
//!    `005` lines ([`Features`])
//! 3. **Channels**: joined channels with topic and membership
//!    ([`Channel`], [`Member`], [`Topic`]), plus the accumulators that
//!    collect them until the end-of-names marker ([`Session`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Client Core (above)  ← the only mutator, from its read loop
//!     ↕
//! Session Layer (this crate)  ← pure data, no I/O
//!     ↕
//! Protocol Layer (below)  ← provides Peer, Message
//! ```

mod channel;
mod features;
mod session;
mod state;

pub use channel::{Channel, Member, Topic};
pub use features::{ChannelModes, Features};
pub use session::Session;
pub use state::ConnectionState;

/// Folds a nickname or channel name for comparison.
///
/// IRC names are case-insensitive; ASCII folding covers every
/// `CASEMAPPING` in practical use.
pub fn casefold(name: &str) -> String {
    name.to_ascii_lowercase()
}
