//! The mutable record of one connection: our nick, the server's
//! features, joined channels and the per-channel sync accumulators.

use std::collections::HashMap;
use std::time::SystemTime;

use ircforge_protocol::Peer;

use crate::{Channel, Features, Member, Topic, casefold};

/// Topic and names collected for a channel until its end-of-names line.
#[derive(Debug, Default)]
struct PendingSync {
    topic: Option<Topic>,
    names: Vec<String>,
}

/// Server-derived state, owned by the client's read loop.
///
/// Every mutator takes the names straight from the wire; lookups are
/// case-insensitive throughout.
#[derive(Debug, Default)]
pub struct Session {
    nick: String,
    features: Features,
    channels: HashMap<String, Channel>,
    pending: HashMap<String, PendingSync>,
}

impl Session {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            ..Self::default()
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn set_nick(&mut self, nick: impl Into<String>) {
        self.nick = nick.into();
    }

    /// Returns `true` if `name` is our own nickname.
    pub fn is_me(&self, name: &str) -> bool {
        casefold(name) == casefold(&self.nick)
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut Features {
        &mut self.features
    }

    pub fn is_channel(&self, target: &str) -> bool {
        self.features.is_channel(target)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&casefold(name))
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Returns `true` if we are in `name` and its member list is complete.
    pub fn is_synced(&self, name: &str) -> bool {
        self.channel(name).is_some_and(|c| c.synced)
    }

    // -- Membership ---------------------------------------------------------

    /// We joined `name`. The channel exists from now on but stays unsynced
    /// until [`finish_names`](Self::finish_names).
    pub fn self_joined(&mut self, name: &str, key: Option<String>) {
        let folded = casefold(name);
        let channel = self
            .channels
            .entry(folded.clone())
            .or_insert_with(|| Channel::new(name));
        if key.is_some() {
            channel.key = key;
        }
        self.pending.insert(folded, PendingSync::default());
        tracing::debug!(channel = name, "joined, waiting for names");
    }

    /// Someone else joined a channel we are in.
    pub fn member_joined(&mut self, name: &str, peer: Peer) -> bool {
        let Some(channel) = self.channels.get_mut(&casefold(name)) else {
            tracing::debug!(channel = name, nick = peer.name(), "join for unknown channel");
            return false;
        };
        channel.insert(Member::new(peer));
        true
    }

    /// `nick` left `name`. When that is us the channel is forgotten.
    pub fn member_parted(&mut self, name: &str, nick: &str) -> bool {
        let folded = casefold(name);
        if self.is_me(nick) {
            self.pending.remove(&folded);
            return self.channels.remove(&folded).is_some();
        }
        self.channels
            .get_mut(&folded)
            .and_then(|channel| channel.remove(nick))
            .is_some()
    }

    /// `nick` was kicked from `name`.
    pub fn member_kicked(&mut self, name: &str, nick: &str) -> bool {
        self.member_parted(name, nick)
    }

    /// `nick` quit the network. Returns the channels they were in.
    pub fn member_quit(&mut self, nick: &str) -> Vec<String> {
        self.channels
            .values_mut()
            .filter_map(|channel| channel.remove(nick).map(|_| channel.name.clone()))
            .collect()
    }

    /// `old` is now known as `new`. Returns the channels that saw it.
    pub fn nick_changed(&mut self, old: &str, new: &str) -> Vec<String> {
        if self.is_me(old) {
            tracing::info!(old, new, "our nick changed");
            self.nick = new.to_string();
        }

        let mut affected = Vec::new();
        for channel in self.channels.values_mut() {
            if let Some(member) = channel.remove(old) {
                channel.insert(Member {
                    peer: member.peer.renamed(new),
                    modes: member.modes,
                });
                affected.push(channel.name.clone());
            }
        }
        affected
    }

    // -- Topic --------------------------------------------------------------

    /// A live `TOPIC` change by `author`.
    pub fn topic_changed(&mut self, name: &str, text: &str, author: Peer) -> bool {
        let Some(channel) = self.channels.get_mut(&casefold(name)) else {
            return false;
        };
        channel.topic = Some(Topic {
            text: text.to_string(),
            author: Some(author),
            set_at: Some(SystemTime::now()),
        });
        true
    }

    /// The topic text reply. Held until end-of-names unless the channel is
    /// already synced, in which case it applies at once. Dropped for a
    /// channel we are not in and nobody asked about.
    pub fn buffer_topic(&mut self, name: &str, text: &str) {
        let folded = casefold(name);
        if let Some(channel) = self.channels.get_mut(&folded).filter(|c| c.synced) {
            channel.topic = Some(Topic::new(text));
            return;
        }
        match self.sync_entry(folded) {
            Some(pending) => pending.topic = Some(Topic::new(text)),
            None => tracing::debug!(channel = name, "topic for unknown channel dropped"),
        }
    }

    /// The optional author/time reply that follows the topic text.
    ///
    /// `set_at` is seconds since the Unix epoch as sent by the server.
    pub fn buffer_topic_author(&mut self, name: &str, author: &str, set_at: Option<u64>) {
        let folded = casefold(name);
        let topic = match self.channels.get_mut(&folded).filter(|c| c.synced) {
            Some(channel) => channel.topic.as_mut(),
            None => self.pending.get_mut(&folded).and_then(|p| p.topic.as_mut()),
        };
        let Some(topic) = topic else {
            tracing::debug!(channel = name, "topic author without topic text");
            return;
        };
        topic.author = Some(Peer::parse(author));
        topic.set_at =
            set_at.map(|secs| SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(secs));
    }

    // -- Names --------------------------------------------------------------

    /// One page of a names reply: space-separated, sigil-prefixed nicks.
    pub fn buffer_names(&mut self, name: &str, names: &str) {
        let Some(pending) = self.sync_entry(casefold(name)) else {
            tracing::debug!(channel = name, "names for unknown channel dropped");
            return;
        };
        pending
            .names
            .extend(names.split(' ').filter(|n| !n.is_empty()).map(str::to_string));
    }

    /// A names query for `name` is on its way; its replies will be
    /// collected even if we are not in the channel.
    pub fn expect_names(&mut self, name: &str) {
        self.pending.entry(casefold(name)).or_default();
    }

    /// Forgets replies collected for a channel we are not in, once nobody
    /// waits for its end-of-names any more.
    pub fn abandon_sync(&mut self, name: &str) {
        let folded = casefold(name);
        if !self.channels.contains_key(&folded) && self.pending.remove(&folded).is_some() {
            tracing::debug!(channel = name, "abandoned names sync");
        }
    }

    /// The sync buffer for a channel we are in or one a names query was
    /// sent for.
    fn sync_entry(&mut self, folded: String) -> Option<&mut PendingSync> {
        if self.channels.contains_key(&folded) {
            return Some(self.pending.entry(folded).or_default());
        }
        self.pending.get_mut(&folded)
    }

    /// End of names: the synchronization point.
    ///
    /// The collected names replace the member list and any buffered topic
    /// is applied. For a channel we are in, the stored channel is marked
    /// synced and a copy returned; otherwise the result is a detached
    /// snapshot answering a names query.
    pub fn finish_names(&mut self, name: &str) -> Channel {
        let folded = casefold(name);
        let pending = self.pending.remove(&folded).unwrap_or_default();

        let mut members = std::collections::BTreeMap::new();
        for entry in &pending.names {
            let (nick, modes) = self.features.split_prefixes(entry);
            members.insert(
                casefold(nick),
                Member {
                    peer: Peer::user(nick),
                    modes,
                },
            );
        }

        match self.channels.get_mut(&folded) {
            Some(channel) => {
                channel.members = members;
                if pending.topic.is_some() {
                    channel.topic = pending.topic;
                }
                if !channel.synced {
                    tracing::info!(channel = %channel.name, members = channel.len(), "channel synced");
                }
                channel.synced = true;
                channel.clone()
            }
            None => Channel {
                name: name.to_string(),
                topic: pending.topic,
                key: None,
                members,
                synced: true,
            },
        }
    }

    // -- Modes --------------------------------------------------------------

    /// Applies a channel `MODE` change such as `+o-v alice bob`.
    ///
    /// Only membership modes and the channel key are tracked; other modes
    /// are walked just to keep arguments lined up.
    pub fn mode_changed(&mut self, name: &str, modes: &str, args: &[String]) -> bool {
        let Some(channel) = self.channels.get_mut(&casefold(name)) else {
            return false;
        };

        let mut args = args.iter();
        let mut adding = true;
        for mode in modes.chars() {
            match mode {
                '+' => adding = true,
                '-' => adding = false,
                _ if self.features.is_prefix_mode(mode) => {
                    let Some(nick) = args.next() else { break };
                    if let Some(member) = channel.member_mut(nick) {
                        if adding {
                            member.modes.insert(mode);
                        } else {
                            member.modes.remove(&mode);
                        }
                    }
                }
                'k' => {
                    let arg = args.next();
                    channel.key = if adding { arg.cloned() } else { None };
                }
                _ if self.features.channel_modes.takes_arg(mode, adding) => {
                    args.next();
                }
                _ => {}
            }
        }
        true
    }

    /// Forgets everything learned from the server. Our nick is kept.
    pub fn clear(&mut self) {
        self.features = Features::default();
        self.channels.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced(session: &mut Session, name: &str, names: &str) -> Channel {
        session.self_joined(name, None);
        session.buffer_names(name, names);
        session.finish_names(name)
    }

    #[test]
    fn test_finish_names_strips_sigils_into_modes() {
        let mut session = Session::new("bot");
        session.self_joined("#test", None);
        assert!(!session.is_synced("#test"));

        session.buffer_names("#test", "alice @bob");
        session.buffer_names("#test", "+carol bot");
        let channel = session.finish_names("#test");

        assert!(channel.synced);
        assert_eq!(channel.len(), 4);
        assert!(channel.member("bob").unwrap().is_operator());
        assert!(channel.member("carol").unwrap().is_voiced());
        assert!(channel.member("alice").unwrap().modes.is_empty());
        assert!(session.is_synced("#TEST"));
    }

    #[test]
    fn test_finish_names_applies_buffered_topic() {
        let mut session = Session::new("bot");
        session.self_joined("#test", None);
        session.buffer_topic("#test", "hello world");
        session.buffer_topic_author("#test", "alice!a@host", Some(1_700_000_000));
        session.buffer_names("#test", "bot");
        let channel = session.finish_names("#test");

        let topic = channel.topic.unwrap();
        assert_eq!(topic.text, "hello world");
        assert_eq!(topic.author.as_ref().map(Peer::name), Some("alice"));
        assert!(topic.set_at.is_some());
    }

    #[test]
    fn test_finish_names_topic_without_author_is_fine() {
        let mut session = Session::new("bot");
        session.self_joined("#test", None);
        session.buffer_topic("#test", "just text");
        let channel = session.finish_names("#test");
        let topic = channel.topic.unwrap();
        assert_eq!(topic.text, "just text");
        assert!(topic.author.is_none());
    }

    #[test]
    fn test_finish_names_for_unjoined_channel_is_detached() {
        let mut session = Session::new("bot");
        session.expect_names("#elsewhere");
        session.buffer_names("#elsewhere", "@op user");
        let snapshot = session.finish_names("#elsewhere");

        assert_eq!(snapshot.len(), 2);
        assert!(session.channel("#elsewhere").is_none());
    }

    #[test]
    fn test_stray_topic_for_unjoined_channel_not_applied_on_join() {
        let mut session = Session::new("bot");
        session.buffer_topic("#x", "stale");
        session.buffer_topic_author("#x", "alice!a@host", Some(1));

        session.self_joined("#x", None);
        session.buffer_names("#x", "bot");
        let channel = session.finish_names("#x");
        assert!(channel.topic.is_none());
    }

    #[test]
    fn test_self_joined_resets_leftover_sync_buffer() {
        let mut session = Session::new("bot");
        session.expect_names("#x");
        session.buffer_topic("#x", "old query");
        session.buffer_names("#x", "alice");

        session.self_joined("#x", None);
        session.buffer_names("#x", "bot");
        let channel = session.finish_names("#x");
        assert!(channel.topic.is_none());
        assert!(!channel.contains("alice"));
    }

    #[test]
    fn test_abandon_sync_drops_unjoined_buffer_only() {
        let mut session = Session::new("bot");
        session.expect_names("#gone");
        session.buffer_topic("#gone", "leftover");
        session.abandon_sync("#gone");
        session.buffer_names("#gone", "alice");
        assert_eq!(session.finish_names("#gone").len(), 0);

        session.self_joined("#kept", None);
        session.buffer_names("#kept", "bot");
        session.abandon_sync("#kept");
        assert_eq!(session.finish_names("#kept").len(), 1);
    }

    #[test]
    fn test_finish_names_refreshes_synced_channel_keeping_topic() {
        let mut session = Session::new("bot");
        session.self_joined("#test", None);
        session.buffer_topic("#test", "kept");
        session.buffer_names("#test", "bot alice");
        session.finish_names("#test");

        session.buffer_names("#test", "bot dave");
        let channel = session.finish_names("#test");
        assert!(channel.contains("dave"));
        assert!(!channel.contains("alice"));
        assert_eq!(channel.topic.unwrap().text, "kept");
    }

    #[test]
    fn test_member_join_part_and_self_part() {
        let mut session = Session::new("bot");
        synced(&mut session, "#test", "bot");

        assert!(session.member_joined("#test", Peer::parse("alice!a@h")));
        assert!(session.channel("#test").unwrap().contains("alice"));
        assert!(!session.member_joined("#nowhere", Peer::user("alice")));

        assert!(session.member_parted("#test", "alice"));
        assert!(!session.channel("#test").unwrap().contains("alice"));

        assert!(session.member_parted("#test", "BOT"));
        assert!(session.channel("#test").is_none());
    }

    #[test]
    fn test_member_kicked_removes_member() {
        let mut session = Session::new("bot");
        synced(&mut session, "#test", "bot alice");
        assert!(session.member_kicked("#test", "alice"));
        assert_eq!(session.channel("#test").unwrap().len(), 1);
    }

    #[test]
    fn test_member_quit_reports_affected_channels() {
        let mut session = Session::new("bot");
        synced(&mut session, "#a", "bot alice");
        synced(&mut session, "#b", "bot alice");
        synced(&mut session, "#c", "bot");

        let mut affected = session.member_quit("alice");
        affected.sort();
        assert_eq!(affected, ["#a", "#b"]);
        assert!(!session.channel("#a").unwrap().contains("alice"));
    }

    #[test]
    fn test_nick_changed_renames_members_and_self() {
        let mut session = Session::new("bot");
        synced(&mut session, "#a", "bot @alice");

        let affected = session.nick_changed("alice", "alicia");
        assert_eq!(affected, ["#a"]);
        let channel = session.channel("#a").unwrap();
        assert!(!channel.contains("alice"));
        assert!(channel.member("alicia").unwrap().is_operator());

        session.nick_changed("bot", "bot_");
        assert_eq!(session.nick(), "bot_");
        assert!(session.channel("#a").unwrap().contains("bot_"));
    }

    #[test]
    fn test_topic_changed_records_author() {
        let mut session = Session::new("bot");
        synced(&mut session, "#a", "bot");
        assert!(session.topic_changed("#a", "new topic", Peer::parse("op!o@h")));

        let topic = session.channel("#a").unwrap().topic.clone().unwrap();
        assert_eq!(topic.text, "new topic");
        assert_eq!(topic.author.unwrap().name(), "op");
    }

    #[test]
    fn test_mode_changed_tracks_prefix_modes_and_key() {
        let mut session = Session::new("bot");
        synced(&mut session, "#a", "bot alice bob");

        let args: Vec<String> = ["*!*@spam", "alice", "secret", "bob"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!(session.mode_changed("#a", "+bokv", &args));

        let channel = session.channel("#a").unwrap();
        assert!(channel.member("alice").unwrap().is_operator());
        assert!(channel.member("bob").unwrap().is_voiced());
        assert_eq!(channel.key.as_deref(), Some("secret"));

        let args = vec!["alice".to_string()];
        session.mode_changed("#a", "-o-k", &args);
        let channel = session.channel("#a").unwrap();
        assert!(!channel.member("alice").unwrap().is_operator());
        assert_eq!(channel.key, None);
    }

    #[test]
    fn test_clear_forgets_server_state() {
        let mut session = Session::new("bot");
        session.features_mut().apply_token("NICKLEN=30");
        synced(&mut session, "#a", "bot");

        session.clear();
        assert_eq!(session.channels().count(), 0);
        assert_eq!(session.features().len_nick, 9);
        assert_eq!(session.nick(), "bot");
    }
}
