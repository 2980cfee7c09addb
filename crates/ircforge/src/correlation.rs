//! Positional reply correlation.
//!
//! IRC has no request ids. A command like `WHOIS` is answered by a run of
//! numerics ending in a known terminator, so in-flight commands are kept
//! in a FIFO and incoming lines are matched against the head only. The
//! head is consumed to completion before the next entry sees anything.

use std::collections::{BTreeSet, VecDeque};

use ircforge_protocol::{Message, numeric};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::ClientError;

/// The reply commands a correlated request waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expect {
    middle: BTreeSet<String>,
    end: BTreeSet<String>,
    error: BTreeSet<String>,
}

impl Expect {
    /// Expects a run of replies terminated by any of `end`.
    pub fn new<I, S>(end: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            middle: BTreeSet::new(),
            end: end.into_iter().map(Into::into).collect(),
            error: BTreeSet::new(),
        }
    }

    /// Informational replies that continue the run.
    pub fn middle<I, S>(mut self, middle: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middle.extend(middle.into_iter().map(Into::into));
        self
    }

    /// Replies that fail the request.
    pub fn error<I, S>(mut self, error: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.error.extend(error.into_iter().map(Into::into));
        self
    }

    /// The reply set of `WHOIS`.
    pub fn whois() -> Self {
        use numeric::*;

        Self::new([RPL_ENDOFWHOIS])
            .middle([
                RPL_AWAY,
                RPL_WHOISREGNICK,
                RPL_WHOISUSER,
                RPL_WHOISSERVER,
                RPL_WHOISOPERATOR,
                RPL_WHOISIDLE,
                RPL_WHOISCHANNELS,
                RPL_WHOISSPECIAL,
                RPL_WHOISACCOUNT,
                RPL_WHOISACTUALLY,
                RPL_WHOISHOST,
                RPL_WHOISSECURE,
            ])
            .error([ERR_NOSUCHNICK, ERR_NOSUCHSERVER, ERR_NONICKNAMEGIVEN])
    }

    fn classify(&self, command: &str) -> Option<Reply> {
        if self.end.contains(command) {
            Some(Reply::End)
        } else if self.error.contains(command) {
            Some(Reply::Error)
        } else if self.middle.contains(command) {
            Some(Reply::Middle)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Middle,
    End,
    Error,
}

/// Numerics the read loop routes itself. They never extend someone
/// else's correlation just because it has started.
fn is_routed(command: &str) -> bool {
    use numeric::*;

    matches!(
        command,
        RPL_WELCOME
            | RPL_ISUPPORT
            | RPL_TOPIC
            | RPL_TOPICWHOTIME
            | RPL_NAMREPLY
            | RPL_ENDOFNAMES
            | ERR_PASSWDMISMATCH
            | ERR_YOUREBANNEDCREEP
    ) || JOIN_ERRORS.contains(&command)
        || NICK_ERRORS.contains(&command)
}

pub(crate) type Replies = Result<Vec<Message>, ClientError>;

struct Pending {
    expect: Expect,
    replies: Vec<Message>,
    /// Taken once the caller has been answered with an error; the entry
    /// then only waits for its own terminator.
    reply: Option<oneshot::Sender<Replies>>,
    deadline: Instant,
}

/// The FIFO of in-flight correlated requests.
#[derive(Default)]
pub(crate) struct Correlations {
    queue: VecDeque<Pending>,
}

impl Correlations {
    pub(crate) fn push(&mut self, expect: Expect, reply: oneshot::Sender<Replies>, deadline: Instant) {
        self.queue.push_back(Pending {
            expect,
            replies: Vec::new(),
            reply: Some(reply),
            deadline,
        });
    }

    /// Offers an incoming line to the head request. Returns `true` when
    /// the line was consumed and must not be dispatched further.
    ///
    /// A request whose caller went away stays at the head until its own
    /// terminator arrives, so its replies are swallowed rather than
    /// credited to the next request. A request refused by an error reply
    /// likewise stays until the terminator that follows the error (`401`
    /// is followed by `318`); any other line retires it and is offered to
    /// the next request.
    pub(crate) fn offer(&mut self, msg: &Message) -> bool {
        loop {
            let Some(head) = self.queue.front_mut() else {
                return false;
            };

            if head.reply.is_none() {
                let end = head.expect.classify(&msg.command) == Some(Reply::End);
                self.queue.pop_front();
                if end {
                    tracing::debug!(command = %msg.command, "refused request terminated");
                    return true;
                }
                continue;
            }

            let kind = match head.expect.classify(&msg.command) {
                Some(kind) => kind,
                None if !head.replies.is_empty() && msg.is_numeric() && !is_routed(&msg.command) => {
                    Reply::Middle
                }
                None => return false,
            };

            match kind {
                Reply::Middle => {
                    head.replies.push(msg.clone());
                }
                Reply::End => {
                    head.replies.push(msg.clone());
                    if let Some(done) = self.queue.pop_front() {
                        tracing::debug!(replies = done.replies.len(), "correlated request complete");
                        if let Some(reply) = done.reply {
                            let _ = reply.send(Ok(done.replies));
                        }
                    }
                }
                Reply::Error => {
                    tracing::debug!(command = %msg.command, "correlated request refused");
                    if let Some(reply) = head.reply.take() {
                        let _ = reply.send(Err(ClientError::protocol(msg)));
                    }
                }
            }
            return true;
        }
    }

    /// Rejects and removes every head request whose deadline has passed.
    pub(crate) fn expire(&mut self, now: Instant) {
        while self.queue.front().is_some_and(|p| p.deadline <= now) {
            if let Some(expired) = self.queue.pop_front() {
                tracing::debug!(replies = expired.replies.len(), "correlated request timed out");
                if let Some(reply) = expired.reply {
                    let _ = reply.send(Err(ClientError::Timeout("request")));
                }
            }
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.queue.front().map(|p| p.deadline)
    }

    pub(crate) fn reject_all(&mut self, err: impl Fn() -> ClientError) {
        for pending in self.queue.drain(..) {
            if let Some(reply) = pending.reply {
                let _ = reply.send(Err(err()));
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn msg(line: &str) -> Message {
        Message::parse(line).unwrap()
    }

    fn whois(queue: &mut Correlations) -> oneshot::Receiver<Replies> {
        let (tx, rx) = oneshot::channel();
        queue.push(Expect::whois(), tx, Instant::now() + Duration::from_secs(30));
        rx
    }

    #[test]
    fn test_offer_accumulates_until_end() {
        let mut queue = Correlations::default();
        let mut rx = whois(&mut queue);

        assert!(queue.offer(&msg(":srv 311 bot alice a host * :Alice")));
        assert!(queue.offer(&msg(":srv 312 bot alice srv :Server")));
        assert!(rx.try_recv().is_err());
        assert!(queue.offer(&msg(":srv 318 bot alice :End of WHOIS")));

        let replies = rx.try_recv().unwrap().unwrap();
        let commands: Vec<_> = replies.iter().map(|m| m.command.as_str()).collect();
        assert_eq!(commands, ["311", "312", "318"]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_offer_error_rejects_with_reply() {
        let mut queue = Correlations::default();
        let mut rx = whois(&mut queue);

        assert!(queue.offer(&msg(":srv 401 bot ghost :No such nick")));
        let err = rx.try_recv().unwrap().unwrap_err();
        assert_eq!(err.reply().map(|m| m.command.as_str()), Some("401"));
    }

    #[test]
    fn test_offer_error_waits_for_own_terminator() {
        let mut queue = Correlations::default();
        let mut ghost = whois(&mut queue);
        let mut alice = whois(&mut queue);

        assert!(queue.offer(&msg(":srv 401 bot ghost :No such nick")));
        assert!(ghost.try_recv().unwrap().is_err());
        assert_eq!(queue.len(), 2);

        assert!(queue.offer(&msg(":srv 318 bot ghost :End of WHOIS")));
        assert!(alice.try_recv().is_err());
        assert_eq!(queue.len(), 1);

        queue.offer(&msg(":srv 311 bot alice a h * :A"));
        queue.offer(&msg(":srv 318 bot alice :End of WHOIS"));
        let replies = alice.try_recv().unwrap().unwrap();
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|m| m.param(1) == Some("alice")));
    }

    #[test]
    fn test_offer_error_without_terminator_hands_over() {
        let mut queue = Correlations::default();
        let _ghost = whois(&mut queue);
        let mut alice = whois(&mut queue);

        queue.offer(&msg(":srv 402 bot nowhere :No such server"));
        // No 318 follows; the next line already belongs to alice.
        assert!(queue.offer(&msg(":srv 311 bot alice a h * :A")));
        assert_eq!(queue.len(), 1);
        queue.offer(&msg(":srv 318 bot alice :End"));
        assert_eq!(alice.try_recv().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_offer_error_then_unrelated_line_falls_through() {
        let mut queue = Correlations::default();
        let _ghost = whois(&mut queue);

        queue.offer(&msg(":srv 401 bot ghost :No such nick"));
        assert!(!queue.offer(&msg(":alice!a@h PRIVMSG #a :hi")));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_offer_undeclared_before_start_falls_through() {
        let mut queue = Correlations::default();
        let _rx = whois(&mut queue);

        assert!(!queue.offer(&msg(":srv 372 bot :- motd line")));
        assert!(!queue.offer(&msg(":alice!a@h PRIVMSG #a :hello")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_offer_undeclared_numeric_after_start_is_middle() {
        let mut queue = Correlations::default();
        let mut rx = whois(&mut queue);

        queue.offer(&msg(":srv 311 bot alice a host * :Alice"));
        assert!(queue.offer(&msg(":srv 276 bot alice :has client certificate")));
        assert!(!queue.offer(&msg(":alice!a@h PRIVMSG bot :still chatting")));
        assert!(!queue.offer(&msg(":srv 353 bot = #a :alice")));
        queue.offer(&msg(":srv 318 bot alice :End"));

        let replies = rx.try_recv().unwrap().unwrap();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[1].command, "276");
    }

    #[test]
    fn test_offer_is_strictly_fifo() {
        let mut queue = Correlations::default();
        let mut first = whois(&mut queue);
        let mut second = whois(&mut queue);

        // Both sets of replies match the same declared commands; the
        // first request gets everything up to the first terminator.
        queue.offer(&msg(":srv 311 bot alice a h * :A"));
        queue.offer(&msg(":srv 311 bot bob b h * :B"));
        queue.offer(&msg(":srv 318 bot alice :End"));
        assert!(second.try_recv().is_err());
        queue.offer(&msg(":srv 318 bot bob :End"));

        let first = first.try_recv().unwrap().unwrap();
        let second = second.try_recv().unwrap().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].param(1), Some("bob"));
    }

    #[test]
    fn test_offer_orphan_absorbs_its_replies() {
        let mut queue = Correlations::default();
        drop(whois(&mut queue));
        let mut live = whois(&mut queue);

        queue.offer(&msg(":srv 311 bot alice a h * :A"));
        queue.offer(&msg(":srv 318 bot alice :End"));
        assert!(live.try_recv().is_err());

        queue.offer(&msg(":srv 311 bot bob b h * :B"));
        queue.offer(&msg(":srv 318 bot bob :End"));
        let replies = live.try_recv().unwrap().unwrap();
        assert_eq!(replies[0].param(1), Some("bob"));
    }

    #[test]
    fn test_expire_rejects_head_with_timeout() {
        let mut queue = Correlations::default();
        let (tx, mut rx) = oneshot::channel();
        let now = Instant::now();
        queue.push(Expect::whois(), tx, now);
        let mut later = whois(&mut queue);

        queue.expire(now + Duration::from_millis(1));
        assert!(matches!(rx.try_recv().unwrap(), Err(ClientError::Timeout(_))));
        assert!(later.try_recv().is_err());
        assert_eq!(queue.len(), 1);
        assert!(queue.next_deadline().is_some());
    }

    #[test]
    fn test_reject_all_drains_queue() {
        let mut queue = Correlations::default();
        let mut a = whois(&mut queue);
        let mut b = whois(&mut queue);
        queue.reject_all(|| ClientError::Closed);

        assert!(matches!(a.try_recv().unwrap(), Err(ClientError::Closed)));
        assert!(matches!(b.try_recv().unwrap(), Err(ClientError::Closed)));
        assert_eq!(queue.len(), 0);
    }
}
