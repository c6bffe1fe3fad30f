//! Live feed abstraction.
//!
//! A live feed delivers single message records for one conversation as they
//! are written. Each subscription is identified by an explicit
//! [`SubscriptionHandle`]; tearing it down is an awaitable call that reports
//! failure instead of hiding it.
//!
//! # Design
//!
//! - `subscribe()` opens a channel scoped to a [`ConversationKey`] and returns
//!   the handle plus a receiver of raw JSON records
//! - `unsubscribe()` closes the channel identified by the handle
//!
//! The receiver ending without an unsubscribe means the feed dropped the
//! channel. Feeds may redeliver records; deduplication happens downstream.

mod mock;
mod polling;

pub use mock::{FeedCall, MockFeed};
pub use polling::PollingFeed;

use async_trait::async_trait;
use chat_types::ConversationKey;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Failure to open a live subscription.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Feed refused the subscription.
    #[error("subscription rejected: {0}")]
    Rejected(String),

    /// Feed could not be reached.
    #[error("feed unavailable: {0}")]
    Unavailable(String),
}

/// Failure to tear down a live subscription.
#[derive(Debug, Error)]
pub enum TeardownError {
    /// Handle does not name an open subscription.
    #[error("unknown subscription {0}")]
    UnknownSubscription(SubscriptionId),

    /// Feed failed to confirm the teardown.
    #[error("unsubscribe failed: {0}")]
    Failed(String),
}

/// Opaque subscription identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle naming one open subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    key: ConversationKey,
}

impl SubscriptionHandle {
    /// Create a handle for a subscription on `key`.
    pub fn new(key: ConversationKey) -> Self {
        Self {
            id: SubscriptionId::new(),
            key,
        }
    }

    /// Subscription identifier.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Conversation the subscription is scoped to.
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }
}

/// An open subscription: its handle and the stream of delivered records.
#[derive(Debug)]
pub struct Subscription {
    /// Handle to pass to [`LiveFeed::unsubscribe`].
    pub handle: SubscriptionHandle,
    /// Raw records, in delivery order.
    pub events: mpsc::Receiver<Value>,
}

/// Live feed trait.
///
/// Implementations handle the delivery mechanism (store polling, in-memory
/// mock, etc).
#[async_trait]
pub trait LiveFeed: Send + Sync {
    /// Open a subscription delivering every record between the two
    /// participants of `key`, in either direction.
    async fn subscribe(&self, key: &ConversationKey) -> Result<Subscription, SubscriptionError>;

    /// Close the subscription named by `handle`.
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TeardownError>;
}
