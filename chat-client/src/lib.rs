//! # chat-client
//!
//! Conversation synchronization for chatsync.
//!
//! This is the library that applications use to show a live conversation.
//!
//! ## Features
//!
//! - **History + live merge**: one bulk fetch and a live feed folded into a
//!   single ordered, duplicate-free view
//! - **One feed at a time**: switching conversations tears the old
//!   subscription down before the new one opens
//! - **Backend abstraction**: pluggable message store, live feed and blob
//!   store (PostgREST over HTTP, polling, mock)
//! - **Pure core**: ordering and lifecycle rules live in chat-core
//!
//! ## Example
//!
//! ```ignore
//! use chatsync_client::{ClientConfig, HttpBlobStore, HttpStore, PollingFeed, SessionManager};
//!
//! let config = ClientConfig::from_file("chatsync.toml".as_ref())?;
//! let store = Arc::new(HttpStore::new(&config.store)?);
//! let feed = Arc::new(PollingFeed::new(store.clone(), config.live.poll_interval(), 256));
//! let blobs = Arc::new(HttpBlobStore::new(&config.store)?);
//!
//! let manager = SessionManager::new(store, feed, blobs, &config);
//! let mut view = manager.open(me, peer).await?;
//! manager.send_text("hi").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob;
pub mod config;
pub mod engine;
pub mod feed;
pub mod session;
pub mod snapshot;
pub mod store;

pub use blob::{object_name, BlobError, BlobStore, HttpBlobStore, MockBlobStore};
pub use config::{ClientConfig, ConfigError, LiveConfig, StorageConfig, StoreConfig};
pub use engine::{MergeHandle, MergeSender};
pub use feed::{
    FeedCall, LiveFeed, MockFeed, PollingFeed, Subscription, SubscriptionError,
    SubscriptionHandle, SubscriptionId, TeardownError,
};
pub use session::{SessionError, SessionManager};
pub use snapshot::{FetchError, SkipReason, Snapshot, SnapshotLoader};
pub use store::{HttpStore, MessageStore, MockStore, StoreError};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
