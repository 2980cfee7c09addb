//! The connection task.
//!
//! One task per connection owns the transport halves, the [`Session`] and
//! every pending operation. The [`Client`](crate::Client) handle talks to
//! it through an mpsc command channel with oneshot replies; nothing here
//! is shared, so nothing here is locked.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use ircforge_protocol::{Message, Peer, command, numeric};
use ircforge_session::{Channel, ConnectionState, Features, Session, casefold};
use ircforge_transport::{LineReader, LineWriter, TransportError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::correlation::{Correlations, Expect};
use crate::{ClientConfig, ClientError, Event, MessageKind, Network, Target};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, ClientError>>;
pub(crate) type EventReceiver = mpsc::UnboundedReceiver<Result<Event, ClientError>>;
type EventSender = mpsc::UnboundedSender<Result<Event, ClientError>>;

/// Requests from the handle to the connection task.
pub(crate) enum Command {
    Join {
        channel: String,
        key: Option<String>,
        reply: Reply<Channel>,
    },
    Names {
        channel: String,
        reply: Reply<Channel>,
    },
    Request {
        message: Message,
        expect: Expect,
        reply: Reply<Vec<Message>>,
    },
    /// Fire-and-acknowledge: replied once the line is flushed.
    Send {
        message: Message,
        reply: Reply<()>,
    },
    Nick {
        reply: oneshot::Sender<String>,
    },
    Features {
        reply: oneshot::Sender<Features>,
    },
    Channel {
        name: String,
        reply: oneshot::Sender<Option<Channel>>,
    },
    Channels {
        reply: oneshot::Sender<Vec<Channel>>,
    },
    Quit {
        reason: String,
    },
}

/// Moves the shared lifecycle state, logging transitions the lifecycle
/// does not expect.
pub(crate) fn transition(state: &watch::Sender<ConnectionState>, next: ConnectionState) {
    let current = *state.borrow();
    if current == next {
        return;
    }
    if !current.can_transition_to(next) {
        tracing::warn!(%current, %next, "unexpected state transition");
    }
    tracing::debug!(from = %current, to = %next, "state changed");
    state.send_replace(next);
}

/// What a freshly spawned connection task hands back.
pub(crate) struct Spawned {
    pub(crate) commands: mpsc::Sender<Command>,
    pub(crate) events: EventReceiver,
    /// Resolves when the server welcomes us, or with why it did not.
    pub(crate) registered: oneshot::Receiver<Result<(), ClientError>>,
    pub(crate) task: JoinHandle<()>,
}

/// Starts the connection task on an already open transport.
pub(crate) fn spawn(
    network: &Network,
    password: Option<String>,
    config: &ClientConfig,
    (reader, writer): (LineReader, LineWriter),
    state: Arc<watch::Sender<ConnectionState>>,
) -> Spawned {
    let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (registered_tx, registered_rx) = oneshot::channel();

    let nicks: Vec<String> = network
        .nicks
        .iter()
        .filter(|n| !n.trim().is_empty())
        .cloned()
        .collect();
    let now = Instant::now();

    let actor = ClientActor {
        session: Session::new(nicks.first().cloned().unwrap_or_default()),
        nicks,
        nick_index: 0,
        username: network.username.clone(),
        realname: network.realname.clone(),
        autojoins: network.autojoins.clone(),
        password,
        config: config.clone(),
        reader,
        writer,
        commands: command_rx,
        events: event_tx,
        state,
        registration: Some(registered_tx),
        register_deadline: Some(now + config.register_timeout),
        joins: HashMap::new(),
        names: HashMap::new(),
        correlations: Correlations::default(),
        outbox: Vec::new(),
        last_seen: now,
        ping_sent: None,
        exit: None,
    };

    Spawned {
        commands: command_tx,
        events: event_rx,
        registered: registered_rx,
        task: tokio::spawn(actor.run()),
    }
}

// ---------------------------------------------------------------------------
// Pending operations
// ---------------------------------------------------------------------------

/// A join in flight. Concurrent joins of one channel share it; an
/// autojoin starts with no waiters at all.
struct PendingJoin {
    waiters: Vec<Reply<Channel>>,
    key: Option<String>,
    deadline: Instant,
}

struct PendingNames {
    reply: Reply<Channel>,
    deadline: Instant,
}

struct Outgoing {
    line: String,
    ack: Option<Reply<()>>,
}

enum Exit {
    Quit { reason: String },
    Fault(ClientError),
}

// ---------------------------------------------------------------------------
// ClientActor
// ---------------------------------------------------------------------------

struct ClientActor {
    session: Session,
    nicks: Vec<String>,
    nick_index: usize,
    username: String,
    realname: String,
    autojoins: Vec<String>,
    password: Option<String>,
    config: ClientConfig,

    reader: LineReader,
    writer: LineWriter,
    commands: mpsc::Receiver<Command>,
    events: EventSender,
    state: Arc<watch::Sender<ConnectionState>>,

    /// Present until the server welcomes us.
    registration: Option<Reply<()>>,
    register_deadline: Option<Instant>,

    /// Keyed by case-folded channel name.
    joins: HashMap<String, PendingJoin>,
    names: HashMap<String, VecDeque<PendingNames>>,
    correlations: Correlations,

    /// Lines produced while handling input, written at the top of the loop.
    outbox: Vec<Outgoing>,
    last_seen: Instant,
    ping_sent: Option<Instant>,
    exit: Option<Exit>,
}

impl ClientActor {
    async fn run(mut self) {
        tracing::info!(nick = self.session.nick(), "registering");
        self.send_registration();

        let exit = loop {
            if let Err(err) = self.flush_outbox().await {
                break Exit::Fault(err.into());
            }
            if let Some(exit) = self.exit.take() {
                break exit;
            }

            let deadline = self.next_deadline();
            tokio::select! {
                line = self.reader.next_line() => self.on_read(line),
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd),
                    None => {
                        self.exit = Some(Exit::Quit {
                            reason: "client dropped".to_string(),
                        });
                    }
                },
                () = sleep_until(deadline) => self.on_deadline(Instant::now()),
            }
        };

        self.finish(exit).await;
    }

    // -- Outbound -----------------------------------------------------------

    fn queue(&mut self, msg: Message, ack: Option<Reply<()>>) {
        let nack = |ack: Option<Reply<()>>, err: ClientError| {
            if let Some(ack) = ack {
                let _ = ack.send(Err(err));
            }
        };

        if let Err(err) = msg.validate() {
            tracing::warn!(%err, "refusing to send illegal message");
            return nack(ack, err.into());
        }
        let line = msg.serialize();
        if line.len() > self.config.max_line_len {
            let max = self.config.max_line_len;
            tracing::warn!(len = line.len(), max, "refusing to send oversized line");
            return nack(ack, TransportError::LineTooLong { max }.into());
        }
        self.outbox.push(Outgoing { line, ack });
    }

    async fn flush_outbox(&mut self) -> Result<(), TransportError> {
        if self.outbox.is_empty() {
            return Ok(());
        }

        let mut result = Ok(());
        let mut acks = Vec::new();
        for out in std::mem::take(&mut self.outbox) {
            if result.is_ok() {
                result = self.writer.write_line(&out.line).await;
            }
            acks.extend(out.ack);
        }
        if result.is_ok() {
            result = self.writer.flush().await;
        }

        for ack in acks {
            let outcome = match &result {
                Ok(()) => Ok(()),
                Err(err) => Err(TransportError::ConnectionClosed(err.to_string()).into()),
            };
            let _ = ack.send(outcome);
        }
        result
    }

    fn send_registration(&mut self) {
        if let Some(password) = self.password.take() {
            self.queue(Message::new(command::PASS).arg(password), None);
        }
        let nick = self.session.nick().to_string();
        self.queue(Message::new(command::NICK).arg(nick), None);
        let user = Message::new(command::USER).args([
            self.username.as_str(),
            "0",
            "*",
            self.realname.as_str(),
        ]);
        self.queue(user, None);
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(Ok(event));
    }

    // -- Commands -----------------------------------------------------------

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Join {
                channel,
                key,
                reply,
            } => self.start_join(&channel, key, Some(reply)),
            Command::Names { channel, reply } => {
                let msg = Message::new(command::NAMES).arg(channel.as_str());
                if let Err(err) = msg.validate() {
                    let _ = reply.send(Err(err.into()));
                    return;
                }
                self.session.expect_names(&channel);
                self.names
                    .entry(casefold(&channel))
                    .or_default()
                    .push_back(PendingNames {
                        reply,
                        deadline: Instant::now() + self.config.request_timeout,
                    });
                self.queue(msg, None);
            }
            Command::Request {
                message,
                expect,
                reply,
            } => {
                if let Err(err) = message.validate() {
                    let _ = reply.send(Err(err.into()));
                    return;
                }
                self.correlations
                    .push(expect, reply, Instant::now() + self.config.request_timeout);
                self.queue(message, None);
            }
            Command::Send { message, reply } => self.queue(message, Some(reply)),
            Command::Nick { reply } => {
                let _ = reply.send(self.session.nick().to_string());
            }
            Command::Features { reply } => {
                let _ = reply.send(self.session.features().clone());
            }
            Command::Channel { name, reply } => {
                let _ = reply.send(self.session.channel(&name).cloned());
            }
            Command::Channels { reply } => {
                let _ = reply.send(self.session.channels().cloned().collect());
            }
            Command::Quit { reason } => self.exit = Some(Exit::Quit { reason }),
        }
    }

    fn start_join(&mut self, channel: &str, key: Option<String>, reply: Option<Reply<Channel>>) {
        if let Some(synced) = self.session.channel(channel).filter(|c| c.synced) {
            if let Some(reply) = reply {
                let _ = reply.send(Ok(synced.clone()));
            }
            return;
        }

        let folded = casefold(channel);
        if let Some(pending) = self.joins.get_mut(&folded) {
            tracing::debug!(channel, "sharing in-flight join");
            pending.waiters.retain(|waiter| !waiter.is_closed());
            pending.waiters.extend(reply);
            return;
        }

        let mut msg = Message::new(command::JOIN).arg(channel);
        if let Some(key) = &key {
            msg = msg.arg(key.as_str());
        }
        if let Err(err) = msg.validate() {
            if let Some(reply) = reply {
                let _ = reply.send(Err(err.into()));
            }
            return;
        }

        self.joins.insert(
            folded,
            PendingJoin {
                waiters: reply.into_iter().collect(),
                key,
                deadline: Instant::now() + self.config.request_timeout,
            },
        );
        self.queue(msg, None);
    }

    // -- Inbound ------------------------------------------------------------

    fn on_read(&mut self, line: Result<Option<String>, TransportError>) {
        match line {
            Ok(Some(line)) => {
                self.last_seen = Instant::now();
                self.ping_sent = None;
                guarded(&line, || self.on_line(&line));
            }
            Ok(None) => {
                let closed = TransportError::ConnectionClosed("server closed the connection".into());
                self.exit = Some(Exit::Fault(closed.into()));
            }
            Err(err) => self.exit = Some(Exit::Fault(err.into())),
        }
    }

    fn on_line(&mut self, line: &str) {
        let msg = match Message::parse(line) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(%err, "skipping malformed line");
                return;
            }
        };

        // Keep-alive never waits behind a correlation.
        if msg.command == command::PING {
            self.on_ping(&msg);
            return;
        }
        if self.correlations.offer(&msg) {
            return;
        }
        self.dispatch(&msg);
    }

    /// The dispatch table: one arm per command the client reacts to.
    fn dispatch(&mut self, msg: &Message) {
        match msg.command.as_str() {
            numeric::RPL_WELCOME => self.on_welcome(msg),
            numeric::RPL_ISUPPORT => self.on_isupport(msg),
            numeric::RPL_TOPIC => {
                if let (Some(channel), Some(text)) = (msg.param(1), msg.param(2)) {
                    self.session.buffer_topic(channel, text);
                }
            }
            numeric::RPL_TOPICWHOTIME => {
                if let (Some(channel), Some(author)) = (msg.param(1), msg.param(2)) {
                    let set_at = msg.param(3).and_then(|t| t.parse().ok());
                    self.session.buffer_topic_author(channel, author, set_at);
                }
            }
            numeric::RPL_NAMREPLY => self.on_names(msg),
            numeric::RPL_ENDOFNAMES => {
                if let Some(channel) = msg.param(1) {
                    self.on_end_of_names(channel);
                }
            }
            numeric::ERR_PASSWDMISMATCH | numeric::ERR_YOUREBANNEDCREEP => self.on_refused(msg),
            code if numeric::NICK_ERRORS.contains(&code) => self.on_nick_error(msg),
            code if numeric::JOIN_ERRORS.contains(&code) => self.on_join_error(msg),
            command::ERROR => self.on_refused(msg),
            command::JOIN => self.on_join(msg),
            command::PART => self.on_part(msg),
            command::KICK => self.on_kick(msg),
            command::QUIT => self.on_quit(msg),
            command::NICK => self.on_nick(msg),
            command::TOPIC => self.on_topic(msg),
            command::MODE => {
                if let (Some(target), Some(modes)) = (msg.param(0), msg.param(1)) {
                    if self.session.is_channel(target) {
                        self.session.mode_changed(target, modes, &msg.args[2..]);
                    }
                }
            }
            command::INVITE => {
                if let (Some(by), Some(channel)) = (msg.source(), msg.param(1)) {
                    self.emit(Event::Invited {
                        channel: channel.to_string(),
                        by,
                    });
                }
            }
            command::PRIVMSG => self.on_text(msg, MessageKind::Privmsg),
            command::NOTICE => self.on_text(msg, MessageKind::Notice),
            other => tracing::debug!(command = other, "ignoring unhandled command"),
        }
    }

    fn on_ping(&mut self, msg: &Message) {
        self.queue(Message::new(command::PONG).args(msg.args.iter().cloned()), None);
        if self.registration.is_some() {
            tracing::debug!("ping before welcome, treating as registered");
            self.become_ready();
        }
    }

    fn on_welcome(&mut self, msg: &Message) {
        if let Some(nick) = msg.param(0) {
            self.session.set_nick(nick);
        }
        self.become_ready();
    }

    fn become_ready(&mut self) {
        let Some(registration) = self.registration.take() else {
            return;
        };
        self.register_deadline = None;
        transition(&self.state, ConnectionState::Ready);
        tracing::info!(nick = self.session.nick(), "registered");
        let _ = registration.send(Ok(()));

        for entry in std::mem::take(&mut self.autojoins) {
            let mut parts = entry.split_whitespace();
            let Some(channel) = parts.next() else {
                continue;
            };
            let key = parts.next().map(str::to_string);
            self.start_join(channel, key, None);
        }
    }

    fn on_isupport(&mut self, msg: &Message) {
        // [our nick, tokens.., "are supported by this server"]
        if msg.args.len() < 3 {
            return;
        }
        let tokens = &msg.args[1..msg.args.len() - 1];
        self.session
            .features_mut()
            .apply_isupport(tokens.iter().map(String::as_str));
    }

    /// Registration-time refusals end the attempt; afterwards they are
    /// only logged and the server's close does the rest.
    fn on_refused(&mut self, msg: &Message) {
        if self.registration.is_some() {
            self.exit = Some(Exit::Fault(ClientError::protocol(msg)));
        } else {
            tracing::error!(command = %msg.command, reason = msg.trailing().unwrap_or_default(), "server refused us");
        }
    }

    fn on_nick_error(&mut self, msg: &Message) {
        if self.registration.is_none() {
            tracing::warn!(command = %msg.command, "nickname change refused");
            return;
        }

        self.nick_index += 1;
        let Some(next) = self.nicks.get(self.nick_index).cloned() else {
            self.exit = Some(Exit::Fault(ClientError::protocol(msg)));
            return;
        };
        tracing::warn!(
            refused = self.session.nick(),
            next = %next,
            "nickname refused, trying fallback"
        );
        self.session.set_nick(next.as_str());
        self.queue(Message::new(command::NICK).arg(next), None);
    }

    fn on_join_error(&mut self, msg: &Message) {
        let Some(channel) = msg.param(1) else {
            return;
        };
        tracing::warn!(channel, command = %msg.command, "join refused");
        if let Some(join) = self.joins.remove(&casefold(channel)) {
            for waiter in join.waiters {
                let _ = waiter.send(Err(ClientError::protocol(msg)));
            }
        }
    }

    fn on_names(&mut self, msg: &Message) {
        // [our nick, (symbol), channel, names]; some servers omit the symbol.
        let n = msg.args.len();
        if n < 3 {
            return;
        }
        self.session.buffer_names(&msg.args[n - 2], &msg.args[n - 1]);
    }

    /// The synchronization point. A pending join wins over a pending names
    /// query, but only once we are actually in the channel.
    fn on_end_of_names(&mut self, name: &str) {
        let folded = casefold(name);
        let channel = self.session.finish_names(name);

        if self.session.channel(name).is_some() {
            if let Some(join) = self.joins.remove(&folded) {
                tracing::info!(channel = name, members = channel.len(), "join complete");
                for waiter in join.waiters {
                    let _ = waiter.send(Ok(channel.clone()));
                }
                return;
            }
        }

        if let Some(queue) = self.names.get_mut(&folded) {
            if let Some(pending) = queue.pop_front() {
                let _ = pending.reply.send(Ok(channel));
            }
            if queue.is_empty() {
                self.names.remove(&folded);
            } else {
                self.session.expect_names(name);
            }
        }
    }

    fn on_join(&mut self, msg: &Message) {
        let (Some(peer), Some(channel)) = (msg.source(), msg.param(0)) else {
            return;
        };
        if self.session.is_me(peer.name()) {
            let key = self
                .joins
                .get(&casefold(channel))
                .and_then(|join| join.key.clone());
            self.session.self_joined(channel, key);
        } else {
            self.session.member_joined(channel, peer.clone());
        }
        self.emit(Event::Joined {
            channel: channel.to_string(),
            peer,
        });
    }

    fn on_part(&mut self, msg: &Message) {
        let (Some(peer), Some(channel)) = (msg.source(), msg.param(0)) else {
            return;
        };
        if self.session.is_me(peer.name()) {
            tracing::info!(channel, "left channel");
        }
        self.session.member_parted(channel, peer.name());
        self.emit(Event::Parted {
            channel: channel.to_string(),
            peer,
            reason: msg.param(1).map(str::to_string),
        });
    }

    fn on_kick(&mut self, msg: &Message) {
        let (Some(by), Some(channel), Some(nick)) = (msg.source(), msg.param(0), msg.param(1))
        else {
            return;
        };
        if self.session.is_me(nick) {
            tracing::warn!(channel, by = by.name(), "kicked from channel");
        }
        self.session.member_kicked(channel, nick);
        self.emit(Event::Kicked {
            channel: channel.to_string(),
            nick: nick.to_string(),
            by,
            reason: msg.param(2).map(str::to_string),
        });
    }

    fn on_quit(&mut self, msg: &Message) {
        let Some(peer) = msg.source() else {
            return;
        };
        let channels = self.session.member_quit(peer.name());
        self.emit(Event::Quit {
            peer,
            reason: msg.param(0).map(str::to_string),
            channels,
        });
    }

    fn on_nick(&mut self, msg: &Message) {
        let (Some(peer), Some(new_nick)) = (msg.source(), msg.param(0)) else {
            return;
        };
        self.session.nick_changed(peer.name(), new_nick);
        self.emit(Event::NickChanged {
            peer,
            new_nick: new_nick.to_string(),
        });
    }

    fn on_topic(&mut self, msg: &Message) {
        let (Some(by), Some(channel)) = (msg.source(), msg.param(0)) else {
            return;
        };
        let text = msg.param(1).unwrap_or_default();
        self.session.topic_changed(channel, text, by.clone());
        self.emit(Event::TopicChanged {
            channel: channel.to_string(),
            text: text.to_string(),
            by,
        });
    }

    fn on_text(&mut self, msg: &Message, kind: MessageKind) {
        let (Some(source), Some(target), Some(text)) = (msg.source(), msg.param(0), msg.param(1))
        else {
            tracing::debug!(command = %msg.command, "text message without source or target");
            return;
        };
        let target = if self.session.is_channel(target) {
            Target::Channel(target.to_string())
        } else {
            Target::Peer(Peer::user(target))
        };
        self.emit(Event::Message {
            source,
            target,
            text: text.to_string(),
            kind,
        });
    }

    // -- Deadlines ----------------------------------------------------------

    fn next_deadline(&self) -> Option<Instant> {
        let ping = self.config.ping_interval.map(|interval| match self.ping_sent {
            Some(sent) => sent + interval,
            None => self.last_seen + interval,
        });
        let joins = self.joins.values().map(|j| j.deadline).min();
        let names = self
            .names
            .values()
            .filter_map(|q| q.front().map(|p| p.deadline))
            .min();

        [
            self.register_deadline,
            self.correlations.next_deadline(),
            joins,
            names,
            ping,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn on_deadline(&mut self, now: Instant) {
        if self.register_deadline.is_some_and(|d| d <= now) {
            self.exit = Some(Exit::Fault(ClientError::Timeout("registration")));
            return;
        }

        self.correlations.expire(now);

        self.joins.retain(|name, join| {
            if join.deadline > now {
                return true;
            }
            tracing::debug!(channel = %name, waiters = join.waiters.len(), "join timed out");
            for waiter in join.waiters.drain(..) {
                let _ = waiter.send(Err(ClientError::Timeout("join")));
            }
            false
        });

        let session = &mut self.session;
        self.names.retain(|name, queue| {
            while queue.front().is_some_and(|p| p.deadline <= now) {
                if let Some(expired) = queue.pop_front() {
                    let _ = expired.reply.send(Err(ClientError::Timeout("names")));
                }
            }
            if queue.is_empty() {
                session.abandon_sync(name);
                return false;
            }
            true
        });

        if let Some(interval) = self.config.ping_interval {
            match self.ping_sent {
                Some(sent) if now >= sent + interval => {
                    self.exit = Some(Exit::Fault(ClientError::Timeout("ping")));
                }
                None if now >= self.last_seen + interval => {
                    tracing::debug!("link idle, pinging server");
                    self.ping_sent = Some(now);
                    self.queue(Message::new(command::PING).arg("ircforge"), None);
                }
                _ => {}
            }
        }
    }

    // -- Shutdown -----------------------------------------------------------

    async fn finish(mut self, exit: Exit) {
        match exit {
            Exit::Quit { reason } => {
                transition(&self.state, ConnectionState::Disconnecting);
                self.quit(&reason).await;
                self.reject_pending();
                transition(&self.state, ConnectionState::Disconnected);
                tracing::info!("disconnected");
            }
            Exit::Fault(err) => {
                let _ = self.writer.shutdown().await;
                self.reject_pending();
                transition(&self.state, ConnectionState::Disconnected);
                match self.registration.take() {
                    Some(registration) => {
                        tracing::warn!(error = %err, "registration failed");
                        let _ = registration.send(Err(err));
                    }
                    None => {
                        tracing::error!(error = %err, "connection lost");
                        let _ = self.events.send(Err(err));
                    }
                }
            }
        }
    }

    /// Sends `QUIT`, then reads and discards until the server closes the
    /// stream or `quit_timeout` runs out.
    async fn quit(&mut self, reason: &str) {
        let quit = Message::new(command::QUIT).arg(reason);
        if let Err(err) = self.writer.send_line(&quit.serialize()).await {
            tracing::warn!(%err, "could not send QUIT");
            return;
        }

        let reader = &mut self.reader;
        let drained = tokio::time::timeout(self.config.quit_timeout, async move {
            while let Ok(Some(_)) = reader.next_line().await {}
        })
        .await;
        if drained.is_err() {
            tracing::debug!("server did not close after QUIT");
        }
        let _ = self.writer.shutdown().await;
    }

    fn reject_pending(&mut self) {
        self.correlations.reject_all(|| ClientError::Closed);
        for (_, join) in self.joins.drain() {
            for waiter in join.waiters {
                let _ = waiter.send(Err(ClientError::Closed));
            }
        }
        for (_, queue) in self.names.drain() {
            for pending in queue {
                let _ = pending.reply.send(Err(ClientError::Closed));
            }
        }
        for out in self.outbox.drain(..) {
            if let Some(ack) = out.ack {
                let _ = ack.send(Err(ClientError::Closed));
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Runs `handle` for one inbound line. A panic is logged and the line
/// skipped so the read loop keeps going. Returns `false` on panic.
fn guarded(line: &str, handle: impl FnOnce()) -> bool {
    if catch_unwind(AssertUnwindSafe(handle)).is_err() {
        tracing::error!(line, "panic while handling line, skipped");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_panic_skips_line_and_keeps_going() {
        let lines = ["PING :a", "PRIVMSG #x :boom", "PING :b"];
        let mut handled = Vec::new();

        let outcomes: Vec<bool> = lines
            .iter()
            .map(|line| {
                guarded(line, || {
                    if line.contains("boom") {
                        panic!("handler bug");
                    }
                    handled.push(*line);
                })
            })
            .collect();

        assert_eq!(outcomes, [true, false, true]);
        assert_eq!(handled, ["PING :a", "PING :b"]);
    }

    #[test]
    fn test_guarded_after_panic_still_runs_handler() {
        assert!(!guarded("x", || panic!("first")));
        let mut parsed = None;
        assert!(guarded(":srv 001 bot :hi", || {
            parsed = Message::parse(":srv 001 bot :hi").ok();
        }));
        assert_eq!(parsed.map(|m| m.command), Some("001".to_string()));
    }
}
