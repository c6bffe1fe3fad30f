//! Live feed built on repeated store queries.
//!
//! Each subscription runs a background task that re-fetches the conversation
//! on an interval and forwards every row it has not forwarded before. Rows
//! are told apart by their server `id`, or by their full JSON text when they
//! have none. Client timestamps play no part, so a peer with a slow clock
//! loses nothing. The first delivery repeats the whole conversation; the
//! merge engine absorbs the overlap with the snapshot.

use super::{
    LiveFeed, Subscription, SubscriptionError, SubscriptionHandle, SubscriptionId, TeardownError,
};
use crate::store::MessageStore;
use async_trait::async_trait;
use chat_types::ConversationKey;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Live feed that polls a [`MessageStore`].
pub struct PollingFeed<S> {
    store: Arc<S>,
    poll_interval: Duration,
    capacity: usize,
    tasks: DashMap<SubscriptionId, JoinHandle<()>>,
}

impl<S: MessageStore + 'static> PollingFeed<S> {
    /// Create a feed polling `store` every `poll_interval`, buffering up to
    /// `capacity` undelivered rows per subscription.
    pub fn new(store: Arc<S>, poll_interval: Duration, capacity: usize) -> Self {
        Self {
            store,
            poll_interval,
            capacity: capacity.max(1),
            tasks: DashMap::new(),
        }
    }

    /// Number of running subscriptions.
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }
}

impl<S> Drop for PollingFeed<S> {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.value().abort();
        }
    }
}

/// Tracks which rows have already been forwarded.
#[derive(Debug, Default)]
struct Cursor {
    forwarded: HashSet<String>,
}

impl Cursor {
    /// Rows not yet forwarded, marking them as forwarded.
    fn advance(&mut self, rows: &[Value]) -> Vec<Value> {
        rows.iter()
            .filter(|row| self.forwarded.insert(row_identity(row)))
            .cloned()
            .collect()
    }
}

fn row_identity(row: &Value) -> String {
    match row.get("id") {
        Some(Value::String(id)) if !id.is_empty() => format!("id:{id}"),
        Some(Value::Number(id)) => format!("id:{id}"),
        _ => format!("row:{row}"),
    }
}

#[async_trait]
impl<S: MessageStore + 'static> LiveFeed for PollingFeed<S> {
    async fn subscribe(&self, key: &ConversationKey) -> Result<Subscription, SubscriptionError> {
        let initial = self
            .store
            .fetch_conversation(key)
            .await
            .map_err(|e| SubscriptionError::Unavailable(e.to_string()))?;
        let mut cursor = Cursor::default();

        let handle = SubscriptionHandle::new(key.clone());
        let (tx, rx) = mpsc::channel(self.capacity);
        let store = Arc::clone(&self.store);
        let poll_key = key.clone();
        let period = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial fetch stands in for it.
            timer.tick().await;

            let mut rows = initial;
            loop {
                for row in cursor.advance(&rows) {
                    if tx.send(row).await.is_err() {
                        tracing::debug!("Poll receiver for {} closed", poll_key);
                        return;
                    }
                }

                timer.tick().await;
                rows = match store.fetch_conversation(&poll_key).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::warn!("Poll for {} failed: {}", poll_key, e);
                        Vec::new()
                    }
                };
            }
        });

        self.tasks.insert(handle.id(), task);
        tracing::debug!("Polling {} every {:?}", key, period);

        Ok(Subscription {
            handle,
            events: rx,
        })
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TeardownError> {
        match self.tasks.remove(&handle.id()) {
            Some((_, task)) => {
                task.abort();
                Ok(())
            }
            None => Err(TeardownError::UnknownSubscription(handle.id())),
        }
    }
}
