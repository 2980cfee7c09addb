//! Server-advertised limits and grammar (`RPL_ISUPPORT`, numeric 005).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ChannelModes
// ---------------------------------------------------------------------------

/// The `CHANMODES=A,B,C,D` grammar: which channel modes take an argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelModes {
    /// Type A: list modes, always take an argument (`b`).
    pub list: String,
    /// Type B: always take an argument (`k`).
    pub always: String,
    /// Type C: take an argument only when set (`l`).
    pub on_set: String,
    /// Type D: never take an argument (`imnpst`).
    pub flags: String,
}

impl ChannelModes {
    /// Parses `A,B,C,D`. Groups past the fourth are ignored; missing
    /// groups are empty.
    pub fn parse(value: &str) -> Self {
        let mut groups = value.split(',').map(str::to_string);
        Self {
            list: groups.next().unwrap_or_default(),
            always: groups.next().unwrap_or_default(),
            on_set: groups.next().unwrap_or_default(),
            flags: groups.next().unwrap_or_default(),
        }
    }

    /// Returns `true` if `mode` consumes an argument in this direction.
    pub fn takes_arg(&self, mode: char, adding: bool) -> bool {
        self.list.contains(mode) || self.always.contains(mode) || (adding && self.on_set.contains(mode))
    }
}

impl Default for ChannelModes {
    fn default() -> Self {
        Self::parse("b,k,l,imnpst")
    }
}

impl fmt::Display for ChannelModes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.list, self.always, self.on_set, self.flags)
    }
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// What the server told us about itself.
///
/// Starts out with RFC 1459 defaults and is overwritten token by token as
/// `005` lines arrive. Keys the client has no typed field for are kept in
/// [`extra`](Self::extra) so callers can still look them up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub len_nick: usize,
    pub len_channel: usize,
    pub len_kick: Option<usize>,
    pub len_topic: Option<usize>,
    pub len_away: Option<usize>,
    pub watch: Option<usize>,
    pub max_targets: Option<usize>,

    /// Sigils that start a channel name.
    pub channel_types: Vec<char>,

    /// Membership prefixes as `(mode, sigil)`, highest rank first.
    pub prefixes: Vec<(char, char)>,

    pub channel_modes: ChannelModes,

    /// Display name of the network (`NETWORK=Libera.Chat`).
    pub network: Option<String>,

    /// Every other token, value-less ones mapped to `None`.
    pub extra: BTreeMap<String, Option<String>>,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            len_nick: 9,
            len_channel: 200,
            len_kick: None,
            len_topic: None,
            len_away: None,
            watch: None,
            max_targets: None,
            channel_types: vec!['#', '&'],
            prefixes: vec![('o', '@'), ('v', '+')],
            channel_modes: ChannelModes::default(),
            network: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Features {
    /// Applies the parameter tokens of one `005` line.
    ///
    /// The caller strips our own nick (first argument) and the
    /// human-readable trailer (last argument).
    pub fn apply_isupport<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) {
        for token in tokens {
            self.apply_token(token);
        }
    }

    /// Applies a single `KEY`, `KEY=VALUE` or `-KEY` token.
    pub fn apply_token(&mut self, token: &str) {
        if let Some(key) = token.strip_prefix('-') {
            self.reset(key);
            return;
        }

        let (key, value) = match token.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (token, None),
        };
        let text = value.unwrap_or_default();

        match key {
            "NICKLEN" => set_number(key, text, |n| self.len_nick = n),
            "CHANNELLEN" => set_number(key, text, |n| self.len_channel = n),
            "KICKLEN" => set_number(key, text, |n| self.len_kick = Some(n)),
            "TOPICLEN" => set_number(key, text, |n| self.len_topic = Some(n)),
            "AWAYLEN" => set_number(key, text, |n| self.len_away = Some(n)),
            "WATCH" => set_number(key, text, |n| self.watch = Some(n)),
            "MAXTARGETS" => set_number(key, text, |n| self.max_targets = Some(n)),
            "CHANTYPES" => self.channel_types = text.chars().collect(),
            "PREFIX" => match parse_prefix(text) {
                Some(prefixes) => self.prefixes = prefixes,
                None => tracing::warn!(value = text, "ignoring malformed PREFIX"),
            },
            "CHANMODES" => self.channel_modes = ChannelModes::parse(text),
            "NETWORK" => self.network = Some(text.to_string()),
            _ => {
                self.extra
                    .insert(key.to_string(), value.map(str::to_string));
            }
        }
    }

    /// Undoes a previously advertised key.
    fn reset(&mut self, key: &str) {
        let defaults = Self::default();
        match key {
            "NICKLEN" => self.len_nick = defaults.len_nick,
            "CHANNELLEN" => self.len_channel = defaults.len_channel,
            "KICKLEN" => self.len_kick = None,
            "TOPICLEN" => self.len_topic = None,
            "AWAYLEN" => self.len_away = None,
            "WATCH" => self.watch = None,
            "MAXTARGETS" => self.max_targets = None,
            "CHANTYPES" => self.channel_types = defaults.channel_types,
            "PREFIX" => self.prefixes = defaults.prefixes,
            "CHANMODES" => self.channel_modes = defaults.channel_modes,
            "NETWORK" => self.network = None,
            _ => {
                self.extra.remove(key);
            }
        }
    }

    /// Returns `true` if `target` names a channel rather than a user.
    pub fn is_channel(&self, target: &str) -> bool {
        target
            .chars()
            .next()
            .is_some_and(|c| self.channel_types.contains(&c))
    }

    /// The membership mode a sigil stands for (`@` → `o`).
    pub fn mode_for_sigil(&self, sigil: char) -> Option<char> {
        self.prefixes
            .iter()
            .find(|(_, s)| *s == sigil)
            .map(|(mode, _)| *mode)
    }

    /// Returns `true` if `mode` is a membership mode (`o`, `v`, ...).
    pub fn is_prefix_mode(&self, mode: char) -> bool {
        self.prefixes.iter().any(|(m, _)| *m == mode)
    }

    /// Strips every leading membership sigil from a NAMES entry.
    ///
    /// Servers with `multi-prefix` send `@+alice`; all sigils are
    /// collected.
    pub fn split_prefixes<'a>(&self, name: &'a str) -> (&'a str, BTreeSet<char>) {
        let mut modes = BTreeSet::new();
        let mut rest = name;
        while let Some(sigil) = rest.chars().next() {
            let Some(mode) = self.mode_for_sigil(sigil) else {
                break;
            };
            modes.insert(mode);
            rest = &rest[sigil.len_utf8()..];
        }
        (rest, modes)
    }
}

fn set_number(key: &str, value: &str, apply: impl FnOnce(usize)) {
    match value.parse() {
        Ok(n) => apply(n),
        Err(_) => tracing::warn!(key, value, "ignoring non-numeric feature value"),
    }
}

/// Parses `(ov)@+` into `[('o','@'), ('v','+')]`. An empty value means
/// the server has no membership prefixes.
fn parse_prefix(value: &str) -> Option<Vec<(char, char)>> {
    if value.is_empty() {
        return Some(Vec::new());
    }
    let (modes, sigils) = value.strip_prefix('(')?.split_once(')')?;
    if modes.chars().count() != sigils.chars().count() {
        return None;
    }
    Some(modes.chars().zip(sigils.chars()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_default_is_rfc() {
        let features = Features::default();
        assert_eq!(features.len_nick, 9);
        assert_eq!(features.channel_types, ['#', '&']);
        assert_eq!(features.prefixes, [('o', '@'), ('v', '+')]);
        assert_eq!(features.channel_modes.to_string(), "b,k,l,imnpst");
        assert!(features.network.is_none());
    }

    #[test]
    fn test_apply_isupport_updates_typed_fields() {
        let mut features = Features::default();
        features.apply_isupport("NICKLEN=16 CHANTYPES=#& PREFIX=(ov)@+".split(' '));

        assert_eq!(features.len_nick, 16);
        assert_eq!(features.channel_types, ['#', '&']);
        assert_eq!(features.prefixes, [('o', '@'), ('v', '+')]);
        assert_eq!(features.mode_for_sigil('@'), Some('o'));
        assert_eq!(features.mode_for_sigil('+'), Some('v'));
    }

    #[test]
    fn test_apply_isupport_keeps_priority_order() {
        let mut features = Features::default();
        features.apply_token("PREFIX=(qaohv)~&@%+");
        let sigils: String = features.prefixes.iter().map(|(_, s)| *s).collect();
        assert_eq!(sigils, "~&@%+");
    }

    #[test]
    fn test_apply_isupport_limits_network_and_chanmodes() {
        let mut features = Features::default();
        features.apply_isupport([
            "KICKLEN=255",
            "TOPICLEN=390",
            "AWAYLEN=200",
            "WATCH=128",
            "MAXTARGETS=4",
            "CHANNELLEN=64",
            "NETWORK=Libera.Chat",
            "CHANMODES=eIbq,k,flj,CFLMPQScgimnprstz",
        ]);
        assert_eq!(features.len_kick, Some(255));
        assert_eq!(features.len_topic, Some(390));
        assert_eq!(features.len_away, Some(200));
        assert_eq!(features.watch, Some(128));
        assert_eq!(features.max_targets, Some(4));
        assert_eq!(features.len_channel, 64);
        assert_eq!(features.network.as_deref(), Some("Libera.Chat"));
        assert_eq!(features.channel_modes.list, "eIbq");
        assert!(features.channel_modes.takes_arg('j', true));
        assert!(!features.channel_modes.takes_arg('j', false));
    }

    #[test]
    fn test_apply_isupport_unknown_keys_kept_in_extra() {
        let mut features = Features::default();
        features.apply_isupport(["CASEMAPPING=rfc1459", "EXCEPTS", "SAFELIST"]);
        assert_eq!(
            features.extra.get("CASEMAPPING"),
            Some(&Some("rfc1459".to_string()))
        );
        assert_eq!(features.extra.get("EXCEPTS"), Some(&None));
        assert!(features.extra.contains_key("SAFELIST"));
    }

    #[test]
    fn test_apply_isupport_negated_key_resets() {
        let mut features = Features::default();
        features.apply_isupport(["NICKLEN=30", "TOPICLEN=300", "EXCEPTS"]);
        features.apply_isupport(["-NICKLEN", "-TOPICLEN", "-EXCEPTS"]);
        assert_eq!(features.len_nick, 9);
        assert_eq!(features.len_topic, None);
        assert!(!features.extra.contains_key("EXCEPTS"));
    }

    #[test]
    fn test_apply_isupport_malformed_values_ignored() {
        let mut features = Features::default();
        features.apply_isupport(["NICKLEN=lots", "PREFIX=(ov)@"]);
        assert_eq!(features.len_nick, 9);
        assert_eq!(features.prefixes, [('o', '@'), ('v', '+')]);
    }

    #[test]
    fn test_split_prefixes_strips_all_sigils() {
        let features = Features::default();
        let (name, modes) = features.split_prefixes("@+alice");
        assert_eq!(name, "alice");
        assert_eq!(modes, BTreeSet::from(['o', 'v']));

        let (name, modes) = features.split_prefixes("bob");
        assert_eq!(name, "bob");
        assert!(modes.is_empty());
    }

    #[test]
    fn test_is_channel_follows_chantypes() {
        let mut features = Features::default();
        assert!(features.is_channel("#rust"));
        assert!(features.is_channel("&local"));
        assert!(!features.is_channel("alice"));
        assert!(!features.is_channel(""));

        features.apply_token("CHANTYPES=#");
        assert!(!features.is_channel("&local"));
    }
}
