//! CLI command implementations.

pub mod history;
pub mod key;
pub mod send;
pub mod upload;
pub mod watch;

use anyhow::{Context, Result};
use chat_client::{
    now_millis, ClientConfig, HttpBlobStore, HttpStore, PollingFeed, SessionManager,
};
use chat_types::{Message, MessageKind, ParticipantId};
use std::sync::Arc;

/// Session manager wired to the HTTP backend.
pub type Manager = SessionManager<HttpStore, PollingFeed<HttpStore>, HttpBlobStore>;

/// Parse both participant ids.
pub fn participants(me: &str, peer: &str) -> Result<(ParticipantId, ParticipantId)> {
    let me = ParticipantId::new(me).context("Invalid --me")?;
    let peer = ParticipantId::new(peer).context("Invalid --peer")?;
    Ok((me, peer))
}

/// Build a session manager for the configured backend.
pub fn connect(config: &ClientConfig) -> Result<Manager> {
    let store = Arc::new(HttpStore::new(&config.store).context("Failed to create store client")?);
    let feed = Arc::new(PollingFeed::new(
        Arc::clone(&store),
        config.live.poll_interval(),
        config.live.channel_capacity,
    ));
    let blobs =
        Arc::new(HttpBlobStore::new(&config.store).context("Failed to create storage client")?);
    Ok(SessionManager::new(store, feed, blobs, config))
}

/// One line per message, as seen by `me`.
pub fn format_message(message: &Message, me: &ParticipantId) -> String {
    let who = if message.sender() == me {
        "me".to_string()
    } else {
        message.sender().to_string()
    };
    let body = match message.kind() {
        MessageKind::Text => message.content().to_string(),
        MessageKind::File => format!("[file] {}", message.content()),
    };
    format!(
        "{:>14}  {}: {}",
        format_age(message.client_timestamp(), now_millis()),
        who,
        body
    )
}

/// Format a millisecond timestamp relative to `now`.
fn format_age(ts: i64, now: i64) -> String {
    let diff = now.saturating_sub(ts).max(0) / 1000;

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} min ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
