//! Print the stored history of a conversation.

use anyhow::{Context, Result};
use chat_client::{ClientConfig, HttpStore, SnapshotLoader};
use chat_core::MergeEngine;
use chat_types::ConversationKey;
use std::sync::Arc;

use super::{format_message, participants};

/// Run the history command.
pub async fn run(config: &ClientConfig, me: &str, peer: &str) -> Result<()> {
    let (me, peer) = participants(me, peer)?;
    let key = ConversationKey::new(&me, &peer);

    let store = Arc::new(HttpStore::new(&config.store).context("Failed to create store client")?);
    let loader = SnapshotLoader::new(store, config.store.request_timeout());
    let snapshot = loader
        .load(&key)
        .await
        .with_context(|| format!("Failed to fetch history for {key}"))?;
    let skipped = snapshot.skipped.len();

    let mut engine = MergeEngine::new();
    engine.apply_snapshot(snapshot.messages);

    println!("=== {} ===", key);
    for message in engine.messages() {
        println!("{}", format_message(message, &me));
    }
    println!();
    println!("{} messages ({} skipped)", engine.len(), skipped);

    Ok(())
}
