//! Channels and their members.

use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

use ircforge_protocol::Peer;
use serde::{Deserialize, Serialize};

use crate::casefold;

/// A channel topic.
///
/// The author and timestamp come from a nonstandard reply and are often
/// missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub text: String,
    pub author: Option<Peer>,
    pub set_at: Option<SystemTime>,
}

impl Topic {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: None,
            set_at: None,
        }
    }
}

/// One user in a channel and the membership modes they hold there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub peer: Peer,
    pub modes: BTreeSet<char>,
}

impl Member {
    pub fn new(peer: Peer) -> Self {
        Self {
            peer,
            modes: BTreeSet::new(),
        }
    }

    pub fn nick(&self) -> &str {
        self.peer.name()
    }

    pub fn has_mode(&self, mode: char) -> bool {
        self.modes.contains(&mode)
    }

    pub fn is_operator(&self) -> bool {
        self.has_mode('o')
    }

    pub fn is_voiced(&self) -> bool {
        self.has_mode('v')
    }
}

/// A channel we are in, or a snapshot of one we asked NAMES about.
///
/// `members` is keyed by case-folded nickname; use [`member`](Self::member)
/// to look someone up by any spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub topic: Option<Topic>,
    /// Join key, when we supplied one or saw it set.
    pub key: Option<String>,
    pub members: BTreeMap<String, Member>,
    /// Set once the end-of-names marker has been processed.
    pub synced: bool,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: None,
            key: None,
            members: BTreeMap::new(),
            synced: false,
        }
    }

    pub fn member(&self, nick: &str) -> Option<&Member> {
        self.members.get(&casefold(nick))
    }

    pub(crate) fn member_mut(&mut self, nick: &str) -> Option<&mut Member> {
        self.members.get_mut(&casefold(nick))
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.members.contains_key(&casefold(nick))
    }

    /// Adds or replaces a member.
    pub fn insert(&mut self, member: Member) {
        self.members.insert(casefold(member.nick()), member);
    }

    pub fn remove(&mut self, nick: &str) -> Option<Member> {
        self.members.remove(&casefold(nick))
    }

    /// Nicknames as the server spelled them, in folded order.
    pub fn nicks(&self) -> impl Iterator<Item = &str> {
        self.members.values().map(Member::nick)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_member_lookup_is_case_insensitive() {
        let mut channel = Channel::new("#Rust");
        channel.insert(Member::new(Peer::user("Alice")));

        assert!(channel.contains("alice"));
        assert_eq!(channel.member("ALICE").map(Member::nick), Some("Alice"));
        assert_eq!(channel.nicks().collect::<Vec<_>>(), ["Alice"]);

        assert!(channel.remove("aLiCe").is_some());
        assert!(channel.is_empty());
    }

    #[test]
    fn test_member_modes() {
        let mut member = Member::new(Peer::user("bob"));
        assert!(!member.is_operator());
        member.modes.insert('o');
        assert!(member.is_operator());
        assert!(!member.is_voiced());
    }

    #[test]
    fn test_channel_serializes_to_json() {
        let mut channel = Channel::new("#test");
        channel.topic = Some(Topic::new("welcome"));
        channel.insert(Member::new(Peer::user("alice")));

        let json = serde_json::to_value(&channel).unwrap();
        assert_eq!(json["name"], "#test");
        assert_eq!(json["topic"]["text"], "welcome");
        assert_eq!(json["members"]["alice"]["peer"]["kind"], "user");

        let back: Channel = serde_json::from_value(json).unwrap();
        assert_eq!(back, channel);
    }
}
