//! Network description and client tuning.

use std::time::Duration;

use ircforge_transport::{DEFAULT_MAX_LINE_LEN, Endpoint};
use serde::{Deserialize, Serialize};

use crate::ClientError;

// ---------------------------------------------------------------------------
// Server / Network
// ---------------------------------------------------------------------------

/// One server of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub tls: bool,

    /// Sent with `PASS` before registration.
    #[serde(default)]
    pub password: Option<String>,
}

impl Server {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: false,
            password: None,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port,
            tls: self.tls,
        }
    }
}

fn default_port() -> u16 {
    6667
}

/// Who we are and where we go.
///
/// ```json
/// {
///   "name": "libera",
///   "servers": [{ "host": "irc.libera.chat", "port": 6697, "tls": true }],
///   "nicks": ["forgebot", "forgebot_"],
///   "autojoins": ["#ircforge"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub name: String,

    /// Tried in order on every connection attempt.
    pub servers: Vec<Server>,

    /// Preferred nickname first; later ones are fallbacks when the
    /// server rejects or already has the earlier ones.
    pub nicks: Vec<String>,

    #[serde(default = "default_ident")]
    pub username: String,

    #[serde(default = "default_ident")]
    pub realname: String,

    /// Channels joined once registration completes. An entry may carry a
    /// key after a space: `"#secret hunter2"`.
    #[serde(default)]
    pub autojoins: Vec<String>,
}

fn default_ident() -> String {
    "ircforge".to_string()
}

impl Network {
    /// A network with a single plain-text server and one nick.
    pub fn new(name: impl Into<String>, server: Server, nick: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            servers: vec![server],
            nicks: vec![nick.into()],
            username: default_ident(),
            realname: default_ident(),
            autojoins: Vec::new(),
        }
    }

    /// Checks that the network can actually be connected to.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.servers.is_empty() {
            return Err(ClientError::Config(format!(
                "network {:?} has no servers",
                self.name
            )));
        }
        if self.nicks.iter().all(|n| n.trim().is_empty()) {
            return Err(ClientError::Config(format!(
                "network {:?} has no nicknames",
                self.name
            )));
        }
        if let Some(nick) = self.nicks.iter().find(|n| n.contains([' ', ',', '*', '?', '!', '@'])) {
            return Err(ClientError::Config(format!("invalid nickname {nick:?}")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Runtime tuning for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on `join`, `names_of`, `whois` and `request`.
    pub request_timeout: Duration,

    /// Bound on the registration handshake.
    pub register_timeout: Duration,

    /// How long `disconnect` waits for the server to close after `QUIT`.
    pub quit_timeout: Duration,

    /// Bound on a single TCP (and TLS) connection attempt.
    pub connect_timeout: Duration,

    /// Base delay between rounds over the server list; grows linearly
    /// with the round and gets up to a quarter of itself as jitter.
    pub connect_backoff: Duration,

    /// Rounds over the server list before `connect` gives up.
    pub connect_attempts: u32,

    /// Idle time after which we ping the server. A second idle interval
    /// without any traffic drops the connection. `None` disables it.
    pub ping_interval: Option<Duration>,

    pub max_line_len: usize,

    /// Capacity of the command channel into the connection task.
    pub command_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            register_timeout: Duration::from_secs(60),
            quit_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            connect_backoff: Duration::from_secs(1),
            connect_attempts: 3,
            ping_interval: Some(Duration::from_secs(180)),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            command_buffer: 64,
        }
    }
}

impl ClientConfig {
    /// Delay before connection round `round` (0-based, so round 1 is the
    /// first retry). Saturates at [`Duration::MAX`].
    pub(crate) fn backoff(&self, round: u32) -> Duration {
        use rand::Rng;

        let base = self.connect_backoff.checked_mul(round).unwrap_or(Duration::MAX);
        let jitter_ms = u64::try_from(self.connect_backoff.as_millis() / 4).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return base;
        }
        base.saturating_add(Duration::from_millis(rand::rng().random_range(0..=jitter_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_deserialize_applies_defaults() {
        let network: Network = serde_json::from_str(
            r##"{
                "servers": [{ "host": "irc.example.net" }],
                "nicks": ["bot"],
                "autojoins": ["#test"]
            }"##,
        )
        .unwrap();

        assert_eq!(network.servers[0].port, 6667);
        assert!(!network.servers[0].tls);
        assert_eq!(network.servers[0].password, None);
        assert_eq!(network.username, "ircforge");
        assert_eq!(network.realname, "ircforge");
        assert_eq!(network.autojoins, ["#test"]);
        assert!(network.validate().is_ok());
    }

    #[test]
    fn test_network_validate_rejects_empty_lists() {
        let mut network = Network::new("test", Server::new("localhost", 6667), "bot");
        network.servers.clear();
        assert!(matches!(network.validate(), Err(ClientError::Config(_))));

        let mut network = Network::new("test", Server::new("localhost", 6667), "bot");
        network.nicks.clear();
        assert!(matches!(network.validate(), Err(ClientError::Config(_))));

        let network = Network::new("test", Server::new("localhost", 6667), "bad nick");
        assert!(matches!(network.validate(), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_server_endpoint() {
        let mut server = Server::new("irc.example.net", 6697);
        server.tls = true;
        assert_eq!(server.endpoint().to_string(), "irc.example.net:6697 (tls)");
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.register_timeout, Duration::from_secs(60));
        assert_eq!(config.quit_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.ping_interval, Some(Duration::from_secs(180)));
        assert_eq!(config.max_line_len, 8192);
        assert_eq!(config.command_buffer, 64);
    }

    #[test]
    fn test_client_config_partial_json() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "connect_attempts": 5, "ping_interval": null }"#).unwrap();
        assert_eq!(config.connect_attempts, 5);
        assert_eq!(config.ping_interval, None);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_grows_with_round() {
        let config = ClientConfig {
            connect_backoff: Duration::from_millis(400),
            ..ClientConfig::default()
        };
        assert!(config.backoff(0) <= Duration::from_millis(100));
        let second = config.backoff(2);
        assert!(second >= Duration::from_millis(800));
        assert!(second <= Duration::from_millis(900));
    }

    #[test]
    fn test_backoff_huge_values_saturate() {
        let config = ClientConfig {
            connect_backoff: Duration::MAX,
            ..ClientConfig::default()
        };
        assert_eq!(config.backoff(u32::MAX), Duration::MAX);
        assert_eq!(config.backoff(1), Duration::MAX);

        let config = ClientConfig {
            connect_backoff: Duration::from_secs(u64::MAX / 2),
            ..ClientConfig::default()
        };
        assert_eq!(config.backoff(3), Duration::MAX);
    }
}
