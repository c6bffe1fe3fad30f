//! Mock message store for testing.
//!
//! Holds rows in memory, assigns server ids on insert, and allows injecting
//! failures and malformed rows.

use super::{record_in_conversation, MessageStore, StoreError};
use async_trait::async_trait;
use chat_types::{ConversationKey, MessageRecord};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Mock message store for testing.
///
/// Clones share state, so a test can keep one handle while the session
/// owns another.
#[derive(Debug, Default, Clone)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    rows: Vec<Value>,
    next_id: u64,
    inserted: Vec<MessageRecord>,
    fetch_count: usize,
    fail_next_fetch: Option<String>,
    fail_next_insert: Option<String>,
    reverse_order: bool,
}

impl MockStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a well-formed row as if it were already persisted.
    ///
    /// A server id is assigned unless the record carries one.
    pub fn seed(&self, record: MessageRecord) {
        let mut inner = self.inner.lock().unwrap();
        let row = inner.assign_id(record);
        inner.rows.push(row);
    }

    /// Add an arbitrary (possibly malformed) raw row.
    pub fn seed_raw(&self, row: Value) {
        let mut inner = self.inner.lock().unwrap();
        inner.rows.push(row);
    }

    /// Records passed to `insert()`, in call order.
    pub fn inserted(&self) -> Vec<MessageRecord> {
        let inner = self.inner.lock().unwrap();
        inner.inserted.clone()
    }

    /// Number of `fetch_conversation()` calls so far.
    pub fn fetch_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.fetch_count
    }

    /// Return rows newest-first, ignoring the requested order.
    pub fn ignore_requested_order(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.reverse_order = true;
    }

    /// Cause the next fetch to fail with the given error.
    pub fn fail_next_fetch(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_fetch = Some(error.to_string());
    }

    /// Cause the next insert to fail with the given error.
    pub fn fail_next_insert(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_insert = Some(error.to_string());
    }
}

impl MockStoreInner {
    fn assign_id(&mut self, mut record: MessageRecord) -> Value {
        if record.id.is_none() {
            self.next_id += 1;
            record.id = Some(chat_types::ServerId::new(self.next_id.to_string()));
        }
        serde_json::to_value(&record).unwrap_or(Value::Null)
    }
}

fn row_timestamp(row: &Value) -> i64 {
    row.get("timestamp").and_then(Value::as_i64).unwrap_or(i64::MAX)
}

#[async_trait]
impl MessageStore for MockStore {
    async fn fetch_conversation(&self, key: &ConversationKey) -> Result<Vec<Value>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetch_count += 1;

        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(StoreError::Unavailable(error));
        }

        let mut rows: Vec<Value> = inner
            .rows
            .iter()
            .filter(|row| record_in_conversation(row, key))
            .cloned()
            .collect();
        rows.sort_by_key(row_timestamp);
        if inner.reverse_order {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn insert(&self, record: &MessageRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_insert.take() {
            return Err(StoreError::Unavailable(error));
        }

        inner.inserted.push(record.clone());
        let row = inner.assign_id(record.clone());
        inner.rows.push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::{MessageKind, ParticipantId};
    use serde_json::json;

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

    fn key(a: &str, b: &str) -> ConversationKey {
        ConversationKey::new(&ParticipantId::new(a).unwrap(), &ParticipantId::new(b).unwrap())
    }

    #[tokio::test]
    async fn fetch_filters_by_conversation_and_sorts() {
        let store = MockStore::new();
        store.seed(record("alice", "bob", "second", 20));
        store.seed(record("carol", "bob", "other", 5));
        store.seed(record("bob", "alice", "first", 10));

        let rows = store.fetch_conversation(&key("bob", "alice")).await.unwrap();
        let contents: Vec<_> = rows.iter().map(|r| r["content"].as_str().unwrap()).collect();
        assert_eq!(contents, ["first", "second"]);
        assert_eq!(rows[0]["id"], "3");
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn reversed_order_mode() {
        let store = MockStore::new();
        store.seed(record("alice", "bob", "a", 1));
        store.seed(record("alice", "bob", "b", 2));
        store.ignore_requested_order();

        let rows = store.fetch_conversation(&key("alice", "bob")).await.unwrap();
        assert_eq!(rows[0]["content"], "b");
    }

    #[tokio::test]
    async fn raw_rows_reach_caller() {
        let store = MockStore::new();
        store.seed_raw(json!({"sender": "alice", "receiver": "bob", "type": "text"}));
        store.seed_raw(json!(42));

        let rows = store.fetch_conversation(&key("alice", "bob")).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn forced_fetch_failure_is_one_shot() {
        let store = MockStore::new();
        store.fail_next_fetch("connection reset");

        let result = store.fetch_conversation(&key("alice", "bob")).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.fetch_conversation(&key("alice", "bob")).await.is_ok());
    }

    #[tokio::test]
    async fn insert_records_and_persists() {
        let store = MockStore::new();
        store.insert(&record("alice", "bob", "hi", 7)).await.unwrap();

        assert_eq!(store.inserted().len(), 1);
        let rows = store.fetch_conversation(&key("alice", "bob")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "1");

        store.fail_next_insert("read only");
        assert!(store.insert(&record("alice", "bob", "x", 8)).await.is_err());
        assert_eq!(store.inserted().len(), 1);
    }
}
