//! Single-writer actor owning a [`MergeEngine`].
//!
//! Every mutation of a conversation's view goes through one bounded queue
//! and is applied by one task, so "check identity, insert, sort, publish" is
//! atomic per command. Observers get full-replace [`ConversationView`]s
//! through a `watch` channel; a new view is published only when something
//! changed.
//!
//! Each session gets its own actor. Once it shuts down its queue is closed,
//! and sends from tasks that outlived the session fail and are dropped.

use chat_core::{
    Advisory, ConversationView, FeedEvent, MergeEngine, SnapshotStatus, SubscriptionState,
    SyncStatus,
};
use chat_types::Message;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug)]
enum Command {
    Snapshot {
        messages: Vec<Message>,
        skipped: usize,
    },
    SnapshotFailed {
        error: String,
    },
    Live(Message),
    LiveSkipped {
        error: String,
    },
    Lifecycle {
        state: SubscriptionState,
        event: Option<FeedEvent>,
    },
    Advise(Advisory),
    Shutdown,
}

/// Cloneable input side of a merge actor.
///
/// Every method returns `false` once the actor has stopped.
#[derive(Debug, Clone)]
pub struct MergeSender {
    tx: mpsc::Sender<Command>,
}

impl MergeSender {
    async fn send(&self, command: Command) -> bool {
        self.tx.send(command).await.is_ok()
    }

    /// Deliver the decoded history.
    pub async fn snapshot(&self, messages: Vec<Message>, skipped: usize) -> bool {
        self.send(Command::Snapshot { messages, skipped }).await
    }

    /// Report that the history fetch failed.
    pub async fn snapshot_failed(&self, error: String) -> bool {
        self.send(Command::SnapshotFailed { error }).await
    }

    /// Deliver one live message.
    pub async fn live(&self, message: Message) -> bool {
        self.send(Command::Live(message)).await
    }

    /// Report a live record that could not be decoded.
    pub async fn live_skipped(&self, error: String) -> bool {
        self.send(Command::LiveSkipped { error }).await
    }

    /// Report a subscription state change.
    pub async fn lifecycle(&self, state: SubscriptionState, event: Option<FeedEvent>) -> bool {
        self.send(Command::Lifecycle { state, event }).await
    }

    /// Record an advisory.
    pub async fn advise(&self, advisory: Advisory) -> bool {
        self.send(Command::Advise(advisory)).await
    }

    /// True once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A running merge actor.
#[derive(Debug)]
pub struct MergeHandle {
    sender: MergeSender,
    view: watch::Receiver<ConversationView>,
    task: Option<JoinHandle<()>>,
}

impl MergeHandle {
    /// Spawn an actor with an empty view and a queue of `capacity` commands.
    pub fn spawn(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (publisher, view) = watch::channel(ConversationView::default());
        let task = tokio::spawn(run(rx, publisher));
        Self {
            sender: MergeSender { tx },
            view,
            task: Some(task),
        }
    }

    /// A sender for feeding the actor.
    pub fn sender(&self) -> MergeSender {
        self.sender.clone()
    }

    /// A receiver of published views.
    pub fn subscribe(&self) -> watch::Receiver<ConversationView> {
        self.view.clone()
    }

    /// The most recently published view.
    pub fn current(&self) -> ConversationView {
        self.view.borrow().clone()
    }

    /// Stop the actor after it has applied everything queued so far.
    pub async fn shutdown(&mut self) {
        let _ = self.sender.tx.send(Command::Shutdown).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for MergeHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Actor {
    engine: MergeEngine,
    status: SyncStatus,
    publisher: watch::Sender<ConversationView>,
}

impl Actor {
    /// Apply one command; returns whether the view changed.
    fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Snapshot { messages, skipped } => {
                let count = messages.len();
                self.engine.apply_snapshot(messages);
                self.status.snapshot = SnapshotStatus::Loaded { count, skipped };
                if skipped > 0 {
                    self.status.advise(Advisory::RecordsSkipped { count: skipped });
                }
                true
            }
            Command::SnapshotFailed { error } => {
                self.status.snapshot = SnapshotStatus::Failed {
                    error: error.clone(),
                };
                self.status.advise(Advisory::FetchFailed { error });
                true
            }
            Command::Live(message) => self.engine.apply_live(message).is_changed(),
            Command::LiveSkipped { error } => {
                self.status.advise(Advisory::EventSkipped { error });
                true
            }
            Command::Lifecycle { state, event } => {
                let advisory = event.as_ref().and_then(Advisory::for_feed_event);
                if state == self.status.live && advisory.is_none() {
                    return false;
                }
                self.status.live = state;
                if let Some(advisory) = advisory {
                    self.status.advise(advisory);
                }
                true
            }
            Command::Advise(advisory) => {
                self.status.advise(advisory);
                true
            }
            Command::Shutdown => false,
        }
    }

    fn publish(&self) {
        let view = ConversationView {
            messages: Arc::from(self.engine.to_vec()),
            revision: self.engine.revision(),
            status: self.status.clone(),
        };
        tracing::debug!(
            "Publishing revision {} ({} messages)",
            view.revision,
            view.len()
        );
        self.publisher.send_replace(view);
    }
}

async fn run(mut rx: mpsc::Receiver<Command>, publisher: watch::Sender<ConversationView>) {
    let mut actor = Actor {
        engine: MergeEngine::new(),
        status: SyncStatus::new(),
        publisher,
    };

    while let Some(command) = rx.recv().await {
        if matches!(command, Command::Shutdown) {
            break;
        }
        if actor.apply(command) {
            actor.publish();
        }
    }
    rx.close();
}
