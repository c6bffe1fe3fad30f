//! # chatsync
//!
//! Command-line front end for chatsync conversations.
//!
//! ## Commands
//!
//! - `key`: Print the conversation key for two participants
//! - `history`: Print the stored history of a conversation
//! - `watch`: Follow a conversation live
//! - `send`: Send a text message
//! - `upload`: Upload a file and send it as a file message
//!
//! ## Example
//!
//! ```bash
//! # Point at a backend
//! export CHATSYNC_URL=https://project.supabase.co
//! export CHATSYNC_API_KEY=...
//!
//! chatsync key alice bob
//! chatsync history --me alice --peer bob
//! chatsync send --me alice --peer bob "Hello!"
//! chatsync upload --me alice --peer bob ./photo.jpg --caption "from the trip"
//! chatsync watch --me alice --peer bob
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{history, key, send, upload, watch};

/// Command-line front end for chatsync conversations.
#[derive(Parser, Debug)]
#[command(name = "chatsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// The two ends of a conversation.
#[derive(clap::Args, Debug)]
struct Pair {
    /// Your participant id
    #[arg(long)]
    me: String,

    /// The other participant's id
    #[arg(long)]
    peer: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the conversation key for two participants
    Key {
        /// First participant
        a: String,
        /// Second participant
        b: String,
    },

    /// Print the stored history of a conversation
    History {
        #[command(flatten)]
        pair: Pair,
    },

    /// Follow a conversation live until interrupted
    Watch {
        #[command(flatten)]
        pair: Pair,
    },

    /// Send a text message
    Send {
        #[command(flatten)]
        pair: Pair,

        /// Message text
        message: String,
    },

    /// Upload a file and send it as a file message
    Upload {
        #[command(flatten)]
        pair: Pair,

        /// File to upload
        file: PathBuf,

        /// Text sent before the file
        #[arg(long, short)]
        caption: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Key { a, b } => {
            key::run(&a, &b)?;
        }
        Commands::History { pair } => {
            let config = config::load(&cli.config)?;
            history::run(&config, &pair.me, &pair.peer).await?;
        }
        Commands::Watch { pair } => {
            let config = config::load(&cli.config)?;
            watch::run(&config, &pair.me, &pair.peer).await?;
        }
        Commands::Send { pair, message } => {
            let config = config::load(&cli.config)?;
            send::run(&config, &pair.me, &pair.peer, &message).await?;
        }
        Commands::Upload {
            pair,
            file,
            caption,
        } => {
            let config = config::load(&cli.config)?;
            upload::run(&config, &pair.me, &pair.peer, &file, caption.as_deref()).await?;
        }
    }

    Ok(())
}
