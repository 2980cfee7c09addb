//! The handler hook.
//!
//! A bot is a set of handlers. Each one sees every event the client reads
//! together with the client itself, so it can answer with
//! [`Client::say`] or run any other operation.

use futures_util::future::BoxFuture;
use ircforge::{Client, Event};

/// What a handler returns. Errors are logged by the dispatcher and never
/// stop other handlers from running.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Reacts to events.
///
/// The trait is object safe so that handlers of different types can live
/// in one [`Registry`](crate::Registry); implementations return a boxed
/// future.
///
/// # Example
///
/// ```rust
/// use futures_util::future::BoxFuture;
/// use ircforge::{Client, Event};
/// use ircforge_dispatch::{Handler, HandlerResult};
///
/// /// Greets everyone who joins a channel.
/// struct Greeter;
///
/// impl Handler for Greeter {
///     fn handle<'a>(&'a self, event: &'a Event, client: &'a Client) -> BoxFuture<'a, HandlerResult> {
///         Box::pin(greet(event, client))
///     }
/// }
///
/// async fn greet(event: &Event, client: &Client) -> HandlerResult {
///     if let Event::Joined { channel, peer } = event {
///         client.say(channel, &format!("hello, {}", peer.name())).await?;
///     }
///     Ok(())
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle<'a>(&'a self, event: &'a Event, client: &'a Client) -> BoxFuture<'a, HandlerResult>;
}

/// A [`Handler`] backed by a closure. Built with [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

/// Turns a closure returning a boxed future into a [`Handler`].
///
/// ```rust
/// use futures_util::FutureExt;
/// use ircforge::Event;
/// use ircforge_dispatch::handler_fn;
///
/// let log = handler_fn(|event, _client| {
///     async move {
///         if let Event::Message { text, .. } = event {
///             println!("{text}");
///         }
///         Ok(())
///     }
///     .boxed()
/// });
/// # let _ = log;
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a Event, &'a Client) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a Event, &'a Client) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, event: &'a Event, client: &'a Client) -> BoxFuture<'a, HandlerResult> {
        (self.f)(event, client)
    }
}
