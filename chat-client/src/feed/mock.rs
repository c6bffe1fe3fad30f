//! Mock live feed for testing.
//!
//! Acts as an in-memory hub: records pushed into it are delivered to every
//! open subscription whose conversation they belong to.

use super::{LiveFeed, Subscription, SubscriptionError, SubscriptionHandle, TeardownError};
use crate::store::record_in_conversation;
use async_trait::async_trait;
use chat_types::ConversationKey;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const DEFAULT_CAPACITY: usize = 64;

/// A call made against the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCall {
    /// `subscribe()` for a conversation.
    Subscribe(ConversationKey),
    /// `unsubscribe()` for a conversation.
    Unsubscribe(ConversationKey),
}

/// Mock live feed for testing.
///
/// Clones share state, so a test can keep one handle while the session
/// owns another.
#[derive(Debug, Clone)]
pub struct MockFeed {
    inner: Arc<Mutex<MockFeedInner>>,
}

#[derive(Debug)]
struct MockFeedInner {
    open: Vec<(SubscriptionHandle, mpsc::Sender<Value>)>,
    calls: Vec<FeedCall>,
    capacity: usize,
    max_active: usize,
    fail_next_subscribe: Option<String>,
    fail_next_unsubscribe: Option<String>,
}

impl Default for MockFeed {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MockFeed {
    /// Create a new mock feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock feed whose subscriptions buffer `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockFeedInner {
                open: Vec::new(),
                calls: Vec::new(),
                capacity: capacity.max(1),
                max_active: 0,
                fail_next_subscribe: None,
                fail_next_unsubscribe: None,
            })),
        }
    }

    /// Deliver a record to every matching open subscription.
    ///
    /// Returns the number of subscriptions it reached. Full or closed
    /// receivers are skipped.
    pub fn push(&self, record: Value) -> usize {
        let inner = self.inner.lock().unwrap();
        let mut delivered = 0;
        for (handle, tx) in &inner.open {
            if record_in_conversation(&record, handle.key()) && tx.try_send(record.clone()).is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }

    /// Close every open channel from the feed side, as a dropped connection
    /// would.
    pub fn drop_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.open.clear();
    }

    /// Number of currently open subscriptions.
    pub fn active_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.open.len()
    }

    /// Highest number of subscriptions that were ever open at once.
    pub fn max_active(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.max_active
    }

    /// Every subscribe and unsubscribe call, in order.
    pub fn calls(&self) -> Vec<FeedCall> {
        let inner = self.inner.lock().unwrap();
        inner.calls.clone()
    }

    /// Cause the next subscribe() to fail with the given error.
    pub fn fail_next_subscribe(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_subscribe = Some(error.to_string());
    }

    /// Cause the next unsubscribe() to fail with the given error.
    ///
    /// The channel is still closed locally.
    pub fn fail_next_unsubscribe(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_unsubscribe = Some(error.to_string());
    }
}

#[async_trait]
impl LiveFeed for MockFeed {
    async fn subscribe(&self, key: &ConversationKey) -> Result<Subscription, SubscriptionError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(FeedCall::Subscribe(key.clone()));

        if let Some(error) = inner.fail_next_subscribe.take() {
            return Err(SubscriptionError::Rejected(error));
        }

        let (tx, rx) = mpsc::channel(inner.capacity);
        let handle = SubscriptionHandle::new(key.clone());
        inner.open.push((handle.clone(), tx));
        inner.max_active = inner.max_active.max(inner.open.len());

        Ok(Subscription {
            handle,
            events: rx,
        })
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TeardownError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(FeedCall::Unsubscribe(handle.key().clone()));

        let position = inner.open.iter().position(|(h, _)| h.id() == handle.id());
        if let Some(i) = position {
            inner.open.remove(i);
        }

        if let Some(error) = inner.fail_next_unsubscribe.take() {
            return Err(TeardownError::Failed(error));
        }
        match position {
            Some(_) => Ok(()),
            None => Err(TeardownError::UnknownSubscription(handle.id())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::ParticipantId;
    use serde_json::json;

    fn key(a: &str, b: &str) -> ConversationKey {
        ConversationKey::new(&ParticipantId::new(a).unwrap(), &ParticipantId::new(b).unwrap())
    }

    #[tokio::test]
    async fn push_reaches_matching_subscriptions_only() {
        let feed = MockFeed::new();
        let mut ab = feed.subscribe(&key("alice", "bob")).await.unwrap();
        let mut ac = feed.subscribe(&key("alice", "carol")).await.unwrap();

        let record = json!({"sender": "bob", "receiver": "alice", "content": "hey"});
        assert_eq!(feed.push(record.clone()), 1);

        assert_eq!(ab.events.recv().await.unwrap(), record);
        assert!(ac.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_closes_channel() {
        let feed = MockFeed::new();
        let mut sub = feed.subscribe(&key("alice", "bob")).await.unwrap();
        assert_eq!(feed.active_count(), 1);

        feed.unsubscribe(sub.handle.clone()).await.unwrap();
        assert_eq!(feed.active_count(), 0);
        assert!(sub.events.recv().await.is_none());

        let again = feed.unsubscribe(sub.handle).await;
        assert!(matches!(again, Err(TeardownError::UnknownSubscription(_))));
    }

    #[tokio::test]
    async fn drop_all_ends_streams() {
        let feed = MockFeed::new();
        let mut sub = feed.subscribe(&key("alice", "bob")).await.unwrap();

        feed.drop_all();
        assert!(sub.events.recv().await.is_none());
        assert_eq!(feed.max_active(), 1);
    }

    #[tokio::test]
    async fn forced_failures_are_one_shot() {
        let feed = MockFeed::new();
        feed.fail_next_subscribe("refused");
        assert!(matches!(
            feed.subscribe(&key("alice", "bob")).await,
            Err(SubscriptionError::Rejected(_))
        ));

        let sub = feed.subscribe(&key("alice", "bob")).await.unwrap();
        feed.fail_next_unsubscribe("timeout");
        assert!(matches!(
            feed.unsubscribe(sub.handle).await,
            Err(TeardownError::Failed(_))
        ));
        assert_eq!(feed.active_count(), 0);
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let feed = MockFeed::new();
        let sub = feed.subscribe(&key("alice", "bob")).await.unwrap();
        feed.unsubscribe(sub.handle).await.unwrap();

        assert_eq!(
            feed.calls(),
            vec![
                FeedCall::Subscribe(key("alice", "bob")),
                FeedCall::Unsubscribe(key("alice", "bob")),
            ]
        );
    }
}
