//! Send a text message.

use anyhow::{Context, Result};
use chat_client::ClientConfig;

use super::{connect, participants};

/// Run the send command.
pub async fn run(config: &ClientConfig, me: &str, peer: &str, text: &str) -> Result<()> {
    let (me, peer) = participants(me, peer)?;
    let manager = connect(config)?;

    manager.open(me, peer.clone()).await?;
    let result = manager.send_text(text).await;
    manager.shutdown().await;

    let message = result.context("Failed to send message")?;
    println!("Sent to {} at {}", peer, message.client_timestamp());
    Ok(())
}
