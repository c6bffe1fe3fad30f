//! Configuration loading for the CLI.
//!
//! The TOML file is optional when it is the default one; the backend URL
//! and key can come from `CHATSYNC_URL` and `CHATSYNC_API_KEY` instead.

use anyhow::{bail, Context, Result};
use chat_client::ClientConfig;
use std::path::Path;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "chatsync.toml";

const URL_VAR: &str = "CHATSYNC_URL";
const API_KEY_VAR: &str = "CHATSYNC_API_KEY";

/// Load the configuration for commands that talk to the backend.
pub fn load(path: &Path) -> Result<ClientConfig> {
    load_with(path, |name| std::env::var(name).ok())
}

fn load_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<ClientConfig> {
    let mut config = if path.exists() {
        ClientConfig::from_file(path)?
    } else if path == Path::new(DEFAULT_CONFIG_FILE) {
        tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
        ClientConfig::default()
    } else {
        bail!("Config file {} does not exist", path.display());
    };

    if let Some(url) = env(URL_VAR).filter(|v| !v.trim().is_empty()) {
        config = config.with_base_url(&url);
    }
    if let Some(key) = env(API_KEY_VAR).filter(|v| !v.trim().is_empty()) {
        config = config.with_api_key(&key);
    }

    config
        .validate_remote()
        .with_context(|| format!("Set store.base_url in {} or {}", path.display(), URL_VAR))?;
    Ok(config)
}
