//! Advisory state published alongside the message view.
//!
//! Nothing in the sync path is fatal. Failures are recorded here and shown
//! by the display layer; the view itself stays at its last good state.

use std::sync::Arc;

use chat_types::Message;

use crate::{FeedEvent, SubscriptionState};

/// Maximum number of advisories retained; older ones are dropped first.
pub const MAX_ADVISORIES: usize = 16;

/// Progress of the one-shot history fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SnapshotStatus {
    /// Fetch still in flight.
    #[default]
    Pending,
    /// Fetch completed.
    Loaded {
        /// Records turned into messages.
        count: usize,
        /// Records skipped because they could not be parsed.
        skipped: usize,
    },
    /// Fetch failed; the view shows live events only.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Something the display layer should surface to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// History fetch failed.
    FetchFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Some records in an otherwise good batch were skipped.
    RecordsSkipped {
        /// Number of skipped records.
        count: usize,
    },
    /// A live event could not be parsed and was dropped.
    EventSkipped {
        /// Error message describing the failure.
        error: String,
    },
    /// Live subscription could not be opened.
    SubscribeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Live subscription dropped after opening.
    FeedDropped {
        /// Reason reported by the feed.
        reason: String,
    },
    /// Unsubscribe failed; the session proceeded anyway.
    TeardownFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// An outgoing message could not be stored.
    SendFailed {
        /// Error message describing the failure.
        error: String,
    },
}

impl Advisory {
    /// The advisory a lifecycle change warrants, if any.
    pub fn for_feed_event(event: &FeedEvent) -> Option<Self> {
        match event {
            FeedEvent::Subscribed | FeedEvent::Closed => None,
            FeedEvent::SubscribeFailed { error } => Some(Self::SubscribeFailed {
                error: error.clone(),
            }),
            FeedEvent::Dropped { reason } => Some(Self::FeedDropped {
                reason: reason.clone(),
            }),
            FeedEvent::TeardownFailed { error } => Some(Self::TeardownFailed {
                error: error.clone(),
            }),
        }
    }
}

/// Advisory state of one open conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncStatus {
    /// History fetch progress.
    pub snapshot: SnapshotStatus,
    /// Live subscription lifecycle.
    pub live: SubscriptionState,
    /// Most recent advisories, oldest first.
    pub advisories: Vec<Advisory>,
    /// Advisories recorded so far, including evicted ones.
    pub total_advised: u64,
}

impl SyncStatus {
    /// Create the status of a freshly opened session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an advisory, evicting the oldest beyond [`MAX_ADVISORIES`].
    pub fn advise(&mut self, advisory: Advisory) {
        if self.advisories.len() == MAX_ADVISORIES {
            self.advisories.remove(0);
        }
        self.advisories.push(advisory);
        self.total_advised += 1;
    }

    /// The most recent advisory, if any.
    pub fn latest(&self) -> Option<&Advisory> {
        self.advisories.last()
    }

    /// True when history is loaded and the live feed is up.
    pub fn is_healthy(&self) -> bool {
        matches!(self.snapshot, SnapshotStatus::Loaded { .. }) && self.live.is_subscribed()
    }
}

/// What observers receive on every change: full-replace semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
    /// Ordered, duplicate-free messages.
    pub messages: Arc<[Message]>,
    /// Merge engine revision the messages correspond to.
    pub revision: u64,
    /// Advisory state.
    pub status: SyncStatus,
}

impl Default for ConversationView {
    fn default() -> Self {
        Self {
            messages: Arc::from(Vec::new()),
            revision: 0,
            status: SyncStatus::default(),
        }
    }
}

impl ConversationView {
    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_status_is_pending_and_unsubscribed() {
        let status = SyncStatus::new();
        assert_eq!(status.snapshot, SnapshotStatus::Pending);
        assert_eq!(status.live, SubscriptionState::Unsubscribed);
        assert!(status.latest().is_none());
        assert!(!status.is_healthy());
    }

    #[test]
    fn advisories_are_bounded() {
        let mut status = SyncStatus::new();
        for count in 0..MAX_ADVISORIES + 4 {
            status.advise(Advisory::RecordsSkipped { count });
        }
        assert_eq!(status.advisories.len(), MAX_ADVISORIES);
        assert_eq!(status.total_advised, (MAX_ADVISORIES + 4) as u64);
        assert_eq!(status.advisories[0], Advisory::RecordsSkipped { count: 4 });
        assert_eq!(
            status.latest(),
            Some(&Advisory::RecordsSkipped {
                count: MAX_ADVISORIES + 3
            })
        );
    }

    #[test]
    fn healthy_requires_history_and_live_feed() {
        let mut status = SyncStatus::new();
        status.snapshot = SnapshotStatus::Loaded {
            count: 3,
            skipped: 0,
        };
        assert!(!status.is_healthy());
        status.live = SubscriptionState::Subscribed;
        assert!(status.is_healthy());
    }

    #[test]
    fn feed_failures_become_advisories() {
        assert_eq!(Advisory::for_feed_event(&FeedEvent::Subscribed), None);
        assert_eq!(Advisory::for_feed_event(&FeedEvent::Closed), None);
        assert_eq!(
            Advisory::for_feed_event(&FeedEvent::Dropped {
                reason: "eof".into()
            }),
            Some(Advisory::FeedDropped {
                reason: "eof".into()
            })
        );
        assert_eq!(
            Advisory::for_feed_event(&FeedEvent::TeardownFailed {
                error: "timeout".into()
            }),
            Some(Advisory::TeardownFailed {
                error: "timeout".into()
            })
        );
    }

    #[test]
    fn default_view_is_empty() {
        let view = ConversationView::default();
        assert!(view.is_empty());
        assert_eq!(view.len(), 0);
        assert_eq!(view.revision, 0);
    }
}
