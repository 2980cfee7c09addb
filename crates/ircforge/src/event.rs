//! Normalized events surfaced by [`Client::read_event`](crate::Client::read_event).

use ircforge_protocol::Peer;

/// Whether a text message was a `PRIVMSG` or a `NOTICE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Privmsg,
    Notice,
}

/// Where a text message was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A channel, e.g. `#rust`.
    Channel(String),
    /// A user, normally ourselves for a private message.
    Peer(Peer),
}

impl Target {
    pub fn name(&self) -> &str {
        match self {
            Self::Channel(name) => name,
            Self::Peer(peer) => peer.name(),
        }
    }

    pub fn is_channel(&self) -> bool {
        matches!(self, Self::Channel(_))
    }
}

/// Something that happened on the connection that callers may care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A `PRIVMSG` or `NOTICE` to a channel or to us.
    Message {
        source: Peer,
        target: Target,
        text: String,
        kind: MessageKind,
    },

    /// Someone (possibly us) joined a channel.
    Joined { channel: String, peer: Peer },

    /// Someone (possibly us) left a channel.
    Parted {
        channel: String,
        peer: Peer,
        reason: Option<String>,
    },

    /// `nick` was kicked from `channel` by `by`.
    Kicked {
        channel: String,
        nick: String,
        by: Peer,
        reason: Option<String>,
    },

    /// Someone quit the network; `channels` are the ones we shared.
    Quit {
        peer: Peer,
        reason: Option<String>,
        channels: Vec<String>,
    },

    NickChanged { peer: Peer, new_nick: String },

    TopicChanged {
        channel: String,
        text: String,
        by: Peer,
    },

    /// `by` invited us to `channel`.
    Invited { channel: String, by: Peer },
}

impl Event {
    /// Where a reply to this event should go: the channel a message was
    /// sent to, or the sender of a private message.
    pub fn reply_target(&self) -> Option<&str> {
        match self {
            Self::Message {
                target: Target::Channel(channel),
                ..
            } => Some(channel),
            Self::Message { source, .. } => Some(source.name()),
            Self::Invited { by, .. } => Some(by.name()),
            _ => None,
        }
    }
}
