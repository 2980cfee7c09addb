//! # ircforge-dispatch
//!
//! Fans [`Event`](ircforge::Event)s out to named handlers.
//!
//! Handlers are registered up front in a [`Registry`]. A [`Dispatcher`]
//! pulls events from a connected [`Client`](ircforge::Client) and hands
//! each one to every handler in registration order. One misbehaving
//! handler, whether it returns an error or panics, never takes the others
//! down with it.
//!
//! ```rust,no_run
//! use ircforge::prelude::*;
//! use ircforge_dispatch::{Dispatcher, Registry, handler_fn};
//!
//! # async fn run(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = Registry::new();
//! registry.register("log", handler_fn(|event, _client| {
//!     println!("{event:?}");
//!     Box::pin(async { Ok(()) })
//! }))?;
//!
//! client.connect().await?;
//! Dispatcher::new(registry).run(&client).await?;
//! # Ok(())
//! # }
//! ```

mod dispatcher;
mod error;
mod handler;

pub use dispatcher::{Dispatcher, Registry};
pub use error::DispatchError;
pub use handler::{Handler, HandlerFn, HandlerResult, handler_fn};

/// The future type handlers return.
pub use futures_util::future::BoxFuture;
