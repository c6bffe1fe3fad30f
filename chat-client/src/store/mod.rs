//! Remote message store abstraction.
//!
//! The store is the system of record for a conversation's history. It
//! answers the bulk query (every row between two participants, ordered by
//! client timestamp) and accepts inserts of newly composed messages.
//!
//! Rows are returned as raw JSON so the caller can decode them one at a
//! time; a single malformed row must not fail the whole batch.

mod http;
mod mock;

pub use http::HttpStore;
pub use mock::MockStore;

use async_trait::async_trait;
use chat_types::{ConversationKey, MessageRecord};
use serde_json::Value;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Request could not be sent or the response not read.
    #[error("request failed: {0}")]
    Request(String),

    /// Store answered with a non-success status.
    #[error("store returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// Response body is not a list of rows.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// Store is not reachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Message store trait.
///
/// Implementations handle the underlying backend (PostgREST over HTTP,
/// in-memory mock, etc).
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetch every row exchanged between the two participants of `key`, in
    /// either direction, requested in ascending client timestamp order.
    ///
    /// Callers must not rely on the order being honored.
    async fn fetch_conversation(&self, key: &ConversationKey) -> Result<Vec<Value>, StoreError>;

    /// Persist a newly composed message.
    async fn insert(&self, record: &MessageRecord) -> Result<(), StoreError>;
}

/// Symmetric participant filter over raw rows. Rows without string
/// participants are kept so malformed data reaches the decoder.
pub(crate) fn record_in_conversation(row: &Value, key: &ConversationKey) -> bool {
    let (Some(sender), Some(receiver)) = (
        row.get("sender").and_then(Value::as_str),
        row.get("receiver").and_then(Value::as_str),
    ) else {
        return true;
    };
    let (a, b) = (key.first().as_str(), key.second().as_str());
    (sender == a && receiver == b) || (sender == b && receiver == a)
}
