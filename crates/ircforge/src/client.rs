//! The public client handle.

use std::sync::Arc;

use ircforge_protocol::{Message, command};
use ircforge_session::{Channel, ConnectionState, Features};
use ircforge_transport::{BoxedStream, Connector, TcpConnector};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::actor::{self, Command, EventReceiver, Reply};
use crate::correlation::Expect;
use crate::{ClientConfig, ClientError, Event, Network, Server};

struct Running {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

/// A connection to one IRC network.
///
/// Every method takes `&self`, so a client can be shared (for instance
/// behind an `Arc`) between a task pulling events and tasks issuing
/// commands. Operations other than [`connect`](Self::connect) fail with
/// [`ClientError::NotConnected`] until registration has completed.
pub struct Client {
    network: Network,
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    state: Arc<watch::Sender<ConnectionState>>,
    running: Mutex<Option<Running>>,
    events: Mutex<Option<EventReceiver>>,
}

impl Client {
    /// A client that reaches the network over TCP (and TLS where asked).
    pub fn new(network: Network, config: ClientConfig) -> Self {
        let connector = TcpConnector::new(config.connect_timeout);
        Self::with_connector(network, config, connector)
    }

    /// A client that opens its streams through `connector`.
    pub fn with_connector(
        network: Network,
        config: ClientConfig,
        connector: impl Connector,
    ) -> Self {
        Self {
            network,
            config,
            connector: Arc::new(connector),
            state: Arc::new(watch::channel(ConnectionState::Disconnected).0),
            running: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Where the connection currently stands.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Connects and registers, returning once the server has welcomed us.
    ///
    /// Servers are tried in order, for up to `connect_attempts` rounds with
    /// a jittered backoff between rounds. Configured autojoins are issued
    /// as soon as registration completes. Calling this on a live client
    /// does nothing.
    ///
    /// # Errors
    /// [`ClientError::Connection`] when no server could be reached,
    /// [`ClientError::Protocol`] when the server refused registration
    /// (every nickname taken, bad password, banned), and
    /// [`ClientError::Timeout`] when it never answered.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.network.validate()?;

        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            return Ok(());
        }
        if let Some(stale) = running.take() {
            let _ = stale.task.await;
        }

        actor::transition(&self.state, ConnectionState::Connecting);
        let (stream, server) = match self.open().await {
            Ok(opened) => opened,
            Err(err) => {
                actor::transition(&self.state, ConnectionState::Disconnected);
                return Err(err);
            }
        };
        actor::transition(&self.state, ConnectionState::Registering);

        let spawned = actor::spawn(
            &self.network,
            server.password.clone(),
            &self.config,
            ircforge_transport::split(stream, self.config.max_line_len),
            Arc::clone(&self.state),
        );

        let registered = match spawned.registered.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Registration(
                "connection task ended before the server welcomed us".into(),
            )),
        };
        if let Err(err) = registered {
            let _ = spawned.task.await;
            return Err(err);
        }

        tracing::info!(network = %self.network.name, server = %server.host, "connected");
        *self.events.lock().await = Some(spawned.events);
        *running = Some(Running {
            commands: spawned.commands,
            task: spawned.task,
        });
        Ok(())
    }

    async fn open(&self) -> Result<(BoxedStream, &Server), ClientError> {
        let rounds = self.config.connect_attempts.max(1);
        let mut last_err = None;

        for round in 0..rounds {
            if round > 0 {
                let delay = self.config.backoff(round);
                tracing::info!(?delay, round, "retrying connection");
                tokio::time::sleep(delay).await;
            }
            for server in &self.network.servers {
                let endpoint = server.endpoint();
                tracing::info!(network = %self.network.name, %endpoint, "connecting");
                match self.connector.connect(&endpoint).await {
                    Ok(stream) => return Ok((stream, server)),
                    Err(err) => {
                        tracing::warn!(%endpoint, error = %err, "connection attempt failed");
                        last_err = Some(err);
                    }
                }
            }
        }

        Err(last_err.map_or_else(
            || ClientError::Config("network has no servers".into()),
            ClientError::Connection,
        ))
    }

    /// Quits and waits for the connection task to finish.
    ///
    /// Sends `QUIT`, drains the socket until the server closes it (or
    /// `quit_timeout` passes) and fails every pending operation with
    /// [`ClientError::Closed`]. A second call, or a call on a client that
    /// never connected, is a no-op.
    pub async fn disconnect(&self, reason: &str) -> Result<(), ClientError> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };

        let _ = running
            .commands
            .send(Command::Quit {
                reason: reason.to_string(),
            })
            .await;
        if let Err(err) = running.task.await {
            tracing::error!(error = %err, "connection task failed");
        }
        Ok(())
    }

    /// Waits for the next event.
    ///
    /// Ordinary traffic never errors. A fatal connection fault is returned
    /// once; after that, and before any connection, this returns
    /// [`ClientError::Closed`].
    ///
    /// Events queue without bound until read: a client that never calls
    /// this keeps every event of the connection in memory.
    pub async fn read_event(&self) -> Result<Event, ClientError> {
        let mut events = self.events.lock().await;
        let Some(receiver) = events.as_mut() else {
            return Err(ClientError::Closed);
        };
        match receiver.recv().await {
            Some(event) => event,
            None => {
                *events = None;
                Err(ClientError::Closed)
            }
        }
    }

    // -- Correlated operations ----------------------------------------------

    /// Joins `channel`, resolving once its member list is synchronized.
    ///
    /// Joining a channel we are already in resolves at once; concurrent
    /// joins of the same channel share a single `JOIN`.
    pub async fn join(&self, channel: &str) -> Result<Channel, ClientError> {
        self.join_with_key(channel, None).await
    }

    pub async fn join_with_key(
        &self,
        channel: &str,
        key: Option<&str>,
    ) -> Result<Channel, ClientError> {
        self.call(|reply| Command::Join {
            channel: channel.to_string(),
            key: key.map(str::to_string),
            reply,
        })
        .await
    }

    /// The current member list of `channel`, whether we are in it or not.
    pub async fn names_of(&self, channel: &str) -> Result<Channel, ClientError> {
        self.call(|reply| Command::Names {
            channel: channel.to_string(),
            reply,
        })
        .await
    }

    /// All `WHOIS` replies for `nick`, in arrival order, ending with the
    /// end-of-whois line.
    pub async fn whois(&self, nick: &str) -> Result<Vec<Message>, ClientError> {
        self.request(Message::new(command::WHOIS).arg(nick), Expect::whois())
            .await
    }

    /// Sends `message` and collects the replies described by `expect`.
    pub async fn request(
        &self,
        message: Message,
        expect: Expect,
    ) -> Result<Vec<Message>, ClientError> {
        self.call(|reply| Command::Request {
            message,
            expect,
            reply,
        })
        .await
    }

    // -- Fire-and-acknowledge -----------------------------------------------

    pub async fn say(&self, target: &str, text: &str) -> Result<(), ClientError> {
        self.send(Message::new(command::PRIVMSG).arg(target).arg(text))
            .await
    }

    pub async fn notice(&self, target: &str, text: &str) -> Result<(), ClientError> {
        self.send(Message::new(command::NOTICE).arg(target).arg(text))
            .await
    }

    pub async fn set_topic(&self, channel: &str, text: &str) -> Result<(), ClientError> {
        self.send(Message::new(command::TOPIC).arg(channel).arg(text))
            .await
    }

    pub async fn part(&self, channel: &str, reason: Option<&str>) -> Result<(), ClientError> {
        let mut msg = Message::new(command::PART).arg(channel);
        if let Some(reason) = reason {
            msg = msg.arg(reason);
        }
        self.send(msg).await
    }

    /// Asks for a new nickname. Our nick changes when the server confirms.
    pub async fn set_nick(&self, nick: &str) -> Result<(), ClientError> {
        self.send(Message::new(command::NICK).arg(nick)).await
    }

    /// Sends a raw message once it passes [`Message::validate`].
    pub async fn send(&self, message: Message) -> Result<(), ClientError> {
        self.call(|reply| Command::Send { message, reply }).await
    }

    // -- Snapshots ----------------------------------------------------------

    pub async fn nick(&self) -> Result<String, ClientError> {
        self.query(|reply| Command::Nick { reply }).await
    }

    pub async fn features(&self) -> Result<Features, ClientError> {
        self.query(|reply| Command::Features { reply }).await
    }

    pub async fn channel(&self, name: &str) -> Result<Option<Channel>, ClientError> {
        self.query(|reply| Command::Channel {
            name: name.to_string(),
            reply,
        })
        .await
    }

    pub async fn channels(&self) -> Result<Vec<Channel>, ClientError> {
        self.query(|reply| Command::Channels { reply }).await
    }

    // -- Plumbing -----------------------------------------------------------

    async fn commands(&self) -> Result<mpsc::Sender<Command>, ClientError> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|running| running.commands.clone())
            .ok_or(ClientError::NotConnected)
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands()
            .await?
            .send(make(reply_tx))
            .await
            .map_err(|_| ClientError::Closed)?;
        reply_rx.await.map_err(|_| ClientError::Closed)?
    }

    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands()
            .await?
            .send(make(reply_tx))
            .await
            .map_err(|_| ClientError::Closed)?;
        reply_rx.await.map_err(|_| ClientError::Closed)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("network", &self.network.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new(
            Network::new("test", Server::new("127.0.0.1", 6667), "bot"),
            ClientConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_operations_before_connect_are_not_connected() {
        let client = client();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(client.join("#a").await, Err(ClientError::NotConnected)));
        assert!(matches!(client.say("#a", "hi").await, Err(ClientError::NotConnected)));
        assert!(matches!(client.nick().await, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_read_event_before_connect_is_closed() {
        assert!(matches!(client().read_event().await, Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_is_noop() {
        let client = client();
        client.disconnect("bye").await.unwrap();
        client.disconnect("bye").await.unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_network() {
        let mut network = Network::new("test", Server::new("127.0.0.1", 6667), "bot");
        network.servers.clear();
        let client = Client::new(network, ClientConfig::default());
        assert!(matches!(client.connect().await, Err(ClientError::Config(_))));
    }
}
