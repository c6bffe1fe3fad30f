//! Upload a file and send it as a file message.

use anyhow::{Context, Result};
use chat_client::ClientConfig;
use std::path::Path;

use super::{connect, participants};

/// Run the upload command.
pub async fn run(
    config: &ClientConfig,
    me: &str,
    peer: &str,
    file: &Path,
    caption: Option<&str>,
) -> Result<()> {
    let (me, peer) = participants(me, peer)?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Path has no file name")?;
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let size = bytes.len();

    let manager = connect(config)?;
    manager.open(me, peer.clone()).await?;
    let result = manager.send_file(&file_name, bytes, caption).await;
    manager.shutdown().await;

    let message = result.context("Failed to send file")?;
    println!("Sent {} ({} bytes) to {}", file_name, size, peer);
    println!("  URL: {}", message.content());
    Ok(())
}
