//! Handler registration and event fan-out.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use ircforge::{Client, ClientError, Event};

use crate::{DispatchError, Handler};

struct Entry {
    name: String,
    handler: Arc<dyn Handler>,
}

/// The handlers of one bot, in registration order.
///
/// Built once up front and handed to a [`Dispatcher`]; there is no global
/// registry.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handler` under `name`.
    ///
    /// # Errors
    /// [`DispatchError::Duplicate`] if `name` is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl Handler,
    ) -> Result<&mut Self, DispatchError> {
        let name = name.into();
        if self.entries.iter().any(|e| e.name == name) {
            return Err(DispatchError::Duplicate(name));
        }
        tracing::debug!(handler = %name, "handler registered");
        self.entries.push(Entry {
            name,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Feeds client events to every registered handler.
pub struct Dispatcher {
    registry: Registry,
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs every handler on `event`, one after another in registration
    /// order. A handler that fails or panics is logged and skipped.
    ///
    /// Returns how many handlers failed.
    pub async fn dispatch(&self, event: &Event, client: &Client) -> usize {
        let mut failed = 0;
        for entry in &self.registry.entries {
            let handler = &entry.handler;
            let outcome = AssertUnwindSafe(async { handler.handle(event, client).await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failed += 1;
                    tracing::warn!(handler = %entry.name, error = %err, "handler failed");
                }
                Err(_) => {
                    failed += 1;
                    tracing::error!(handler = %entry.name, "handler panicked");
                }
            }
        }
        failed
    }

    /// Reads events from `client` and dispatches each one until the
    /// connection ends.
    ///
    /// Returns `Ok(())` once the client is closed by
    /// [`Client::disconnect`].
    ///
    /// # Errors
    /// The fatal connection fault reported by [`Client::read_event`].
    pub async fn run(&self, client: &Client) -> Result<(), ClientError> {
        tracing::info!(handlers = self.registry.len(), "dispatching events");
        loop {
            let event = match client.read_event().await {
                Ok(event) => event,
                Err(ClientError::Closed) => {
                    tracing::info!("event stream closed");
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            tracing::trace!(?event, "dispatching");
            self.dispatch(&event, client).await;
        }
    }
}
