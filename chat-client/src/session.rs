//! Conversation sessions.
//!
//! A [`SessionManager`] owns at most one open conversation. Opening one
//! starts the history fetch in the background, subscribes to the live feed,
//! and wires both into a fresh merge actor. Switching to another
//! conversation tears the old subscription down first, so no two feeds are
//! ever open at once from one manager.
//!
//! # Example
//!
//! ```ignore
//! let manager = SessionManager::new(store, feed, blobs, &config);
//! let mut view = manager.open(me, peer).await?;
//!
//! manager.send_text("hello").await?;
//!
//! while view.changed().await.is_ok() {
//!     render(&view.borrow().messages);
//! }
//! ```

use crate::blob::{object_name, BlobError, BlobStore};
use crate::config::ClientConfig;
use crate::engine::{MergeHandle, MergeSender};
use crate::feed::{LiveFeed, SubscriptionHandle};
use crate::now_millis;
use crate::snapshot::SnapshotLoader;
use crate::store::{MessageStore, StoreError};
use chat_core::{Action, Advisory, ConversationView, Event, FeedEvent, SubscriptionState};
use chat_types::{
    ConversationKey, Message, MessageKind, MessageRecord, ParticipantId, TimestampPolicy,
};
use serde_json::Value;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No conversation is open.
    #[error("no conversation is open")]
    NotOpen,

    /// Both participants are the same.
    #[error("cannot open a conversation with yourself ({0})")]
    SelfConversation(ParticipantId),

    /// Message has nothing to send.
    #[error("message is empty")]
    EmptyMessage,

    /// Store rejected the message.
    #[error("send failed: {0}")]
    Store(#[from] StoreError),

    /// Attachment upload failed.
    #[error("upload failed: {0}")]
    Blob(#[from] BlobError),
}

/// Tunables shared by every session of a manager.
#[derive(Debug, Clone)]
struct Settings {
    bucket: String,
    fetch_timeout: Duration,
    capacity: usize,
}

type SharedState = Arc<StdMutex<SubscriptionState>>;

/// Apply `event` to the shared state machine. Returns the previous state,
/// the new state, and the actions to run.
fn transition(
    state: &SharedState,
    event: Event,
) -> (SubscriptionState, SubscriptionState, Vec<Action>) {
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    let previous = *guard;
    let (next, actions) = previous.on_event(event);
    *guard = next;
    (previous, next, actions)
}

fn log_feed_event(key: &ConversationKey, event: &FeedEvent) {
    match event {
        FeedEvent::Subscribed => tracing::debug!("Live feed for {} is up", key),
        FeedEvent::Closed => tracing::debug!("Live feed for {} closed", key),
        FeedEvent::SubscribeFailed { error } => {
            tracing::warn!("Live feed for {} failed to open: {}", key, error)
        }
        FeedEvent::Dropped { reason } => {
            tracing::warn!("Live feed for {} dropped: {}", key, reason)
        }
        FeedEvent::TeardownFailed { error } => {
            tracing::warn!("Unsubscribe for {} failed, continuing: {}", key, error)
        }
    }
}

/// One open conversation.
struct Session {
    key: ConversationKey,
    me: ParticipantId,
    peer: ParticipantId,
    merge: MergeHandle,
    state: SharedState,
    handle: Option<SubscriptionHandle>,
    events: Option<mpsc::Receiver<Value>>,
    snapshot_task: Option<JoinHandle<()>>,
    pump_task: Option<JoinHandle<()>>,
}

impl Session {
    fn start_pump(&mut self) {
        let Some(events) = self.events.take() else {
            return;
        };
        self.pump_task = Some(tokio::spawn(pump(
            events,
            self.key.clone(),
            Arc::clone(&self.state),
            self.merge.sender(),
        )));
    }

    fn stop_pump(&mut self) {
        if let Some(task) = self.pump_task.take() {
            task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.snapshot_task.take() {
            task.abort();
        }
        self.stop_pump();
    }
}

/// Forward live records to the merge actor until the channel ends.
async fn pump(
    mut events: mpsc::Receiver<Value>,
    key: ConversationKey,
    state: SharedState,
    merge: MergeSender,
) {
    while let Some(raw) = events.recv().await {
        match MessageRecord::decode(&raw, TimestampPolicy::ReceivedAt(now_millis())) {
            Ok(message) if key.matches(message.sender(), message.receiver()) => {
                if !merge.live(message).await {
                    return;
                }
            }
            Ok(message) => {
                tracing::debug!(
                    "Ignoring live record from {} to {} on {}",
                    message.sender(),
                    message.receiver(),
                    key
                );
            }
            Err(e) => {
                tracing::warn!("Skipping live record on {}: {}", key, e);
                if !merge.live_skipped(e.to_string()).await {
                    return;
                }
            }
        }
    }

    let (_, next, actions) = transition(
        &state,
        Event::ChannelDropped {
            reason: "feed closed the channel".into(),
        },
    );
    for action in actions {
        if let Action::Emit(event) = action {
            log_feed_event(&key, &event);
            merge.lifecycle(next, Some(event)).await;
        }
    }
}

/// Owns the open conversation and its live subscription.
pub struct SessionManager<S, F, B> {
    store: Arc<S>,
    feed: Arc<F>,
    blobs: Arc<B>,
    settings: Settings,
    current: Mutex<Option<Session>>,
}

impl<S, F, B> SessionManager<S, F, B>
where
    S: MessageStore + 'static,
    F: LiveFeed + 'static,
    B: BlobStore + 'static,
{
    /// Create a manager with no open conversation.
    pub fn new(store: Arc<S>, feed: Arc<F>, blobs: Arc<B>, config: &ClientConfig) -> Self {
        Self {
            store,
            feed,
            blobs,
            settings: Settings {
                bucket: config.storage.bucket.clone(),
                fetch_timeout: config.store.request_timeout(),
                capacity: config.live.channel_capacity,
            },
            current: Mutex::new(None),
        }
    }

    /// Open the conversation between `me` and `peer`.
    ///
    /// Any open conversation is torn down first, even one for the same
    /// pair. The returned receiver starts at an empty view and is updated
    /// on every change.
    ///
    /// # Errors
    ///
    /// Only [`SessionError::SelfConversation`]. Fetch and subscription
    /// failures are reported through the view's status.
    pub async fn open(
        &self,
        me: ParticipantId,
        peer: ParticipantId,
    ) -> Result<watch::Receiver<ConversationView>, SessionError> {
        if me == peer {
            return Err(SessionError::SelfConversation(me));
        }

        let mut current = self.current.lock().await;
        if let Some(old) = current.take() {
            self.teardown(old).await;
        }

        let key = ConversationKey::new(&me, &peer);
        tracing::info!("Opening conversation {}", key);

        let merge = MergeHandle::spawn(self.settings.capacity);
        let view = merge.subscribe();
        let snapshot_task = self.spawn_snapshot(key.clone(), merge.sender());

        let mut session = Session {
            key,
            me,
            peer,
            merge,
            state: Arc::new(StdMutex::new(SubscriptionState::new())),
            handle: None,
            events: None,
            snapshot_task: Some(snapshot_task),
            pump_task: None,
        };
        self.drive(&mut session, Event::SubscribeRequested).await;

        *current = Some(session);
        Ok(view)
    }

    /// Close the open conversation, if any.
    pub async fn close(&self) {
        let mut current = self.current.lock().await;
        if let Some(session) = current.take() {
            self.teardown(session).await;
        }
    }

    /// Close everything; call when the view goes away.
    pub async fn shutdown(&self) {
        self.close().await;
        tracing::info!("Session manager shut down");
    }

    /// Key of the open conversation.
    pub async fn current_key(&self) -> Option<ConversationKey> {
        let current = self.current.lock().await;
        current.as_ref().map(|s| s.key.clone())
    }

    /// Latest view of the open conversation.
    pub async fn view(&self) -> Option<ConversationView> {
        let current = self.current.lock().await;
        current.as_ref().map(|s| s.merge.current())
    }

    /// Send a text message in the open conversation.
    ///
    /// The message shows up in the view immediately; the feed's echo of the
    /// stored copy is absorbed by the merge engine.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotOpen`], [`SessionError::EmptyMessage`], or
    /// [`SessionError::Store`] if the store rejected it. A rejected message
    /// stays in the view.
    pub async fn send_text(&self, text: &str) -> Result<Message, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.send(text.to_string(), MessageKind::Text).await
    }

    /// Upload a file and send it as a file message, optionally preceded by
    /// a text caption.
    ///
    /// # Errors
    ///
    /// [`SessionError::Blob`] if the upload fails (nothing is sent), and
    /// otherwise the same as [`send_text`](Self::send_text).
    pub async fn send_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<Message, SessionError> {
        if self.current_key().await.is_none() {
            return Err(SessionError::NotOpen);
        }

        let name = object_name(now_millis(), file_name);
        let url = self
            .blobs
            .upload(&self.settings.bucket, &name, bytes)
            .await?;
        tracing::info!("Uploaded {} to {}", name, self.settings.bucket);

        if let Some(caption) = caption.filter(|c| !c.trim().is_empty()) {
            self.send(caption.to_string(), MessageKind::Text).await?;
        }
        self.send(url, MessageKind::File).await
    }

    async fn send(&self, content: String, kind: MessageKind) -> Result<Message, SessionError> {
        let (me, peer, merge) = {
            let current = self.current.lock().await;
            let session = current.as_ref().ok_or(SessionError::NotOpen)?;
            (session.me.clone(), session.peer.clone(), session.merge.sender())
        };

        let message = Message::new(me, peer, content, kind, now_millis());
        self.deliver(&merge, message).await
    }

    /// Echo a composed message into the view, then store it.
    ///
    /// The store write happens even if the conversation closed in between.
    async fn deliver(
        &self,
        merge: &MergeSender,
        message: Message,
    ) -> Result<Message, SessionError> {
        if !merge.live(message.clone()).await {
            tracing::debug!(
                "Conversation closed before local echo of message to {}",
                message.receiver()
            );
        }

        if let Err(e) = self.store.insert(&MessageRecord::from(&message)).await {
            tracing::warn!("Failed to store message: {}", e);
            merge
                .advise(Advisory::SendFailed {
                    error: e.to_string(),
                })
                .await;
            return Err(e.into());
        }
        Ok(message)
    }

    fn spawn_snapshot(&self, key: ConversationKey, merge: MergeSender) -> JoinHandle<()> {
        let loader = SnapshotLoader::new(Arc::clone(&self.store), self.settings.fetch_timeout);
        tokio::spawn(async move {
            let delivered = match loader.load(&key).await {
                Ok(snapshot) => {
                    merge
                        .snapshot(snapshot.messages, snapshot.skipped.len())
                        .await
                }
                Err(e) => {
                    tracing::warn!("History fetch for {} failed: {}", key, e);
                    merge.snapshot_failed(e.to_string()).await
                }
            };
            if !delivered {
                tracing::debug!("Discarding history for closed conversation {}", key);
            }
        })
    }

    /// Run the state machine from `event` until it settles, executing the
    /// actions it asks for.
    async fn drive(&self, session: &mut Session, event: Event) {
        let mut pending = Some(event);
        while let Some(event) = pending.take() {
            let (previous, state, actions) = transition(&session.state, event);

            let emits = actions.iter().any(|a| matches!(a, Action::Emit(_)));
            if state != previous && !emits {
                session.merge.sender().lifecycle(state, None).await;
            }

            for action in actions {
                match action {
                    Action::Open => pending = Some(self.open_feed(session).await),
                    Action::StartPump => session.start_pump(),
                    Action::StopPump => session.stop_pump(),
                    Action::Close => pending = Some(self.close_feed(session).await),
                    Action::Emit(event) => {
                        log_feed_event(&session.key, &event);
                        session.merge.sender().lifecycle(state, Some(event)).await;
                    }
                }
            }
        }
    }

    async fn open_feed(&self, session: &mut Session) -> Event {
        match self.feed.subscribe(&session.key).await {
            Ok(subscription) => {
                session.handle = Some(subscription.handle);
                session.events = Some(subscription.events);
                Event::SubscribeSucceeded
            }
            Err(e) => Event::SubscribeFailed {
                error: e.to_string(),
            },
        }
    }

    async fn close_feed(&self, session: &mut Session) -> Event {
        let Some(handle) = session.handle.take() else {
            return Event::UnsubscribeCompleted;
        };
        match self.feed.unsubscribe(handle).await {
            Ok(()) => Event::UnsubscribeCompleted,
            Err(e) => Event::UnsubscribeFailed {
                error: e.to_string(),
            },
        }
    }

    async fn teardown(&self, mut session: Session) {
        tracing::info!("Closing conversation {}", session.key);

        if let Some(task) = session.snapshot_task.take() {
            task.abort();
        }
        self.drive(&mut session, Event::UnsubscribeRequested).await;
        session.stop_pump();

        // A feed that dropped on its own still holds our handle.
        if let Some(handle) = session.handle.take() {
            if let Err(e) = self.feed.unsubscribe(handle).await {
                tracing::debug!("Releasing dropped feed for {}: {}", session.key, e);
            }
        }

        session.merge.shutdown().await;
    }
}
