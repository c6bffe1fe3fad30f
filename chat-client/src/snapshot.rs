//! One-shot history fetch for a conversation.
//!
//! The loader issues a single bulk query and decodes each row on its own.
//! Rows that fail to decode, or that belong to another conversation, are
//! skipped and counted; only a failure of the query itself is an error.

use crate::store::{MessageStore, StoreError};
use chat_types::{ConversationKey, Message, MessageRecord, ParseError, TimestampPolicy};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Bulk query failure.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Store query failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Store did not answer in time.
    #[error("history fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a row was left out of a snapshot.
#[derive(Debug)]
pub enum SkipReason {
    /// Row could not be decoded.
    Parse(ParseError),
    /// Row decoded but is not between the two participants.
    OutsideConversation,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::OutsideConversation => write!(f, "record is outside the conversation"),
        }
    }
}

/// Decoded result of one bulk query.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Messages in the order the store returned them.
    pub messages: Vec<Message>,
    /// Skipped rows as `(row index, reason)`.
    pub skipped: Vec<(usize, SkipReason)>,
}

impl Snapshot {
    /// Decode raw rows for `key`.
    ///
    /// Snapshot rows must carry their own client timestamp; a row without
    /// one has no defensible position in history.
    pub fn decode(key: &ConversationKey, rows: &[serde_json::Value]) -> Self {
        let mut snapshot = Self::default();
        for (index, row) in rows.iter().enumerate() {
            match MessageRecord::decode(row, TimestampPolicy::Required) {
                Ok(message) if key.matches(message.sender(), message.receiver()) => {
                    snapshot.messages.push(message);
                }
                Ok(_) => snapshot.skipped.push((index, SkipReason::OutsideConversation)),
                Err(e) => snapshot.skipped.push((index, SkipReason::Parse(e))),
            }
        }
        snapshot
    }
}

/// Loads the history of a conversation from a [`MessageStore`].
pub struct SnapshotLoader<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S> Clone for SnapshotLoader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            timeout: self.timeout,
        }
    }
}

impl<S: MessageStore> SnapshotLoader<S> {
    /// Create a loader giving each fetch at most `timeout`.
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Fetch and decode every message of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the query fails or times out. Individual
    /// bad rows never fail the load.
    pub async fn load(&self, key: &ConversationKey) -> Result<Snapshot, FetchError> {
        let rows = tokio::time::timeout(self.timeout, self.store.fetch_conversation(key))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        let snapshot = Snapshot::decode(key, &rows);
        for (index, reason) in &snapshot.skipped {
            tracing::warn!("Skipping history record {} for {}: {}", index, key, reason);
        }
        tracing::debug!(
            "Loaded {} messages for {} ({} skipped)",
            snapshot.messages.len(),
            key,
            snapshot.skipped.len()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockStore;
    use chat_types::{MessageKind, ParticipantId};
    use serde_json::json;

    fn key(a: &str, b: &str) -> ConversationKey {
        ConversationKey::new(&ParticipantId::new(a).unwrap(), &ParticipantId::new(b).unwrap())
    }

    fn record(sender: &str, receiver: &str, content: &str, ts: i64) -> MessageRecord {
        MessageRecord {
            id: None,
            sender: sender.into(),
            receiver: receiver.into(),
            content: content.into(),
            kind: MessageKind::Text,
            timestamp: ts,
            created_at: None,
        }
    }

    fn loader(store: &Arc<MockStore>) -> SnapshotLoader<MockStore> {
        SnapshotLoader::new(Arc::clone(store), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn loads_both_directions() {
        let store = Arc::new(MockStore::new());
        store.seed(record("alice", "bob", "hi", 100));
        store.seed(record("bob", "alice", "hey", 150));

        let snapshot = loader(&store).load(&key("alice", "bob")).await.unwrap();
        assert_eq!(snapshot.messages.len(), 2);
        assert!(snapshot.skipped.is_empty());
        assert!(snapshot.messages.iter().all(|m| m.is_confirmed()));
    }

    #[tokio::test]
    async fn malformed_rows_are_skipped_not_fatal() {
        let store = Arc::new(MockStore::new());
        store.seed(record("alice", "bob", "one", 1));
        store.seed(record("bob", "alice", "two", 2));
        store.seed_raw(json!({"sender": "alice", "receiver": "bob", "content": "?", "type": "video", "timestamp": 3}));
        store.seed(record("alice", "bob", "three", 4));

        let snapshot = loader(&store).load(&key("alice", "bob")).await.unwrap();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.skipped.len(), 1);
        assert!(matches!(
            snapshot.skipped[0].1,
            SkipReason::Parse(ParseError::UnknownKind(_))
        ));
    }

    #[tokio::test]
    async fn rows_without_timestamp_are_skipped() {
        let store = Arc::new(MockStore::new());
        store.seed_raw(json!({"sender": "alice", "receiver": "bob", "content": "x", "type": "text"}));

        let snapshot = loader(&store).load(&key("alice", "bob")).await.unwrap();
        assert!(snapshot.messages.is_empty());
        assert!(matches!(
            snapshot.skipped[0].1,
            SkipReason::Parse(ParseError::MissingTimestamp)
        ));
    }

    #[test]
    fn rows_from_other_conversations_are_skipped() {
        let rows = vec![
            serde_json::to_value(record("alice", "carol", "not ours", 1)).unwrap(),
            serde_json::to_value(record("alice", "bob", "ours", 2)).unwrap(),
        ];
        let snapshot = Snapshot::decode(&key("alice", "bob"), &rows);
        assert_eq!(snapshot.messages.len(), 1);
        assert!(matches!(snapshot.skipped[0], (0, SkipReason::OutsideConversation)));
    }

    #[tokio::test]
    async fn store_failure_is_fetch_error() {
        let store = Arc::new(MockStore::new());
        store.fail_next_fetch("503");

        let result = loader(&store).load(&key("alice", "bob")).await;
        assert!(matches!(result, Err(FetchError::Store(StoreError::Unavailable(_)))));
    }

    #[tokio::test]
    async fn empty_history_is_valid() {
        let store = Arc::new(MockStore::new());
        let snapshot = loader(&store).load(&key("alice", "bob")).await.unwrap();
        assert!(snapshot.messages.is_empty());
        assert!(snapshot.skipped.is_empty());
    }
}
