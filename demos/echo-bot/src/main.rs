//! Joins the configured channels and repeats anything said as
//! `echo: <text>`.
//!
//! ```text
//! RUST_LOG=debug cargo run -p echo-bot -- demos/echo-bot/network.json
//! ```

use ircforge::prelude::*;
use ircforge_dispatch::{BoxFuture, Dispatcher, Handler, HandlerResult, Registry};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Echo handler
// ---------------------------------------------------------------------------

const TRIGGER: &str = "echo:";

/// The text to repeat, if `text` asks for it.
fn echo_text(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(TRIGGER)?.trim();
    (!rest.is_empty()).then_some(rest)
}

struct Echo;

impl Handler for Echo {
    fn handle<'a>(&'a self, event: &'a Event, client: &'a Client) -> BoxFuture<'a, HandlerResult> {
        Box::pin(echo(event, client))
    }
}

async fn echo(event: &Event, client: &Client) -> HandlerResult {
    let Event::Message {
        source,
        text,
        kind: MessageKind::Privmsg,
        ..
    } = event
    else {
        return Ok(());
    };
    let (Some(reply), Some(target)) = (echo_text(text), event.reply_target()) else {
        return Ok(());
    };

    tracing::debug!(from = source.name(), %target, "echoing");
    client.say(target, reply).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: echo-bot <network.json>")?;
    let network: Network = serde_json::from_str(&std::fs::read_to_string(&path)?)?;

    let mut registry = Registry::new();
    registry.register("echo", Echo)?;
    let dispatcher = Dispatcher::new(registry);

    let client = Client::new(network, ClientConfig::default());
    client.connect().await?;

    tokio::select! {
        result = dispatcher.run(&client) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, quitting"),
    }

    client.disconnect("echo-bot shutting down").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_text_strips_trigger() {
        assert_eq!(echo_text("echo: hello world"), Some("hello world"));
        assert_eq!(echo_text("echo:hi"), Some("hi"));
    }

    #[test]
    fn test_echo_text_ignores_other_messages() {
        assert_eq!(echo_text("hello"), None);
        assert_eq!(echo_text("echo:   "), None);
        assert_eq!(echo_text("say echo: hi"), None);
    }
}
