//! Live subscription state machine for chatsync.
//!
//! This module provides a pure, side-effect-free state machine for the
//! lifecycle of one conversation's live subscription. It takes events as
//! input and produces a new state plus a list of actions to execute.
//!
//! ```text
//! Unsubscribed -> Subscribing -> Subscribed -> Unsubscribing -> Unsubscribed
//! ```
//!
//! The actual I/O (opening and closing feeds) is performed by chat-client.

/// Subscription lifecycle - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    /// No live subscription.
    #[default]
    Unsubscribed,
    /// Subscribe requested, waiting for the feed to confirm.
    Subscribing,
    /// Feed is delivering events.
    Subscribed,
    /// Unsubscribe requested, waiting for the feed to confirm.
    Unsubscribing,
}

impl SubscriptionState {
    /// Create a new state machine in the Unsubscribed state.
    pub fn new() -> Self {
        Self::Unsubscribed
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// A subscribe request while `Subscribing` or `Subscribed` is illegal and
    /// produces no action. Unsubscribe failures still end in `Unsubscribed`:
    /// teardown is logged and the session moves on.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Unsubscribed
            (Self::Unsubscribed, Event::SubscribeRequested) => {
                (Self::Subscribing, vec![Action::Open])
            }

            // From Subscribing
            (Self::Subscribing, Event::SubscribeSucceeded) => (
                Self::Subscribed,
                vec![Action::StartPump, Action::Emit(FeedEvent::Subscribed)],
            ),
            (Self::Subscribing, Event::SubscribeFailed { error }) => (
                Self::Unsubscribed,
                vec![Action::Emit(FeedEvent::SubscribeFailed { error })],
            ),
            (Self::Subscribing, Event::UnsubscribeRequested) => {
                (Self::Unsubscribing, vec![Action::Close])
            }

            // From Subscribed
            (Self::Subscribed, Event::UnsubscribeRequested) => {
                (Self::Unsubscribing, vec![Action::StopPump, Action::Close])
            }
            (Self::Subscribed, Event::ChannelDropped { reason }) => (
                Self::Unsubscribed,
                vec![Action::Emit(FeedEvent::Dropped { reason })],
            ),

            // From Unsubscribing
            (Self::Unsubscribing, Event::UnsubscribeCompleted) => {
                (Self::Unsubscribed, vec![Action::Emit(FeedEvent::Closed)])
            }
            (Self::Unsubscribing, Event::UnsubscribeFailed { error }) => (
                Self::Unsubscribed,
                vec![Action::Emit(FeedEvent::TeardownFailed { error })],
            ),
            // A subscribe that was in flight when teardown began resolves here.
            (Self::Unsubscribing, Event::SubscribeSucceeded | Event::SubscribeFailed { .. }) => {
                (Self::Unsubscribing, vec![])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a subscription is open or being opened.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Subscribing | Self::Subscribed)
    }

    /// Check if events are flowing.
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

/// Events that can occur in the subscription lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Session asked for a live subscription.
    SubscribeRequested,
    /// Feed confirmed the subscription.
    SubscribeSucceeded,
    /// Feed refused or failed to open the subscription.
    SubscribeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Feed closed the channel without being asked to.
    ChannelDropped {
        /// Reason for the drop.
        reason: String,
    },
    /// Session asked to tear the subscription down.
    UnsubscribeRequested,
    /// Feed confirmed the teardown.
    UnsubscribeCompleted,
    /// Feed failed to tear the subscription down.
    UnsubscribeFailed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Actions for the client to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ask the feed to open a subscription.
    Open,
    /// Start forwarding delivered events to the merge engine.
    StartPump,
    /// Stop forwarding events.
    StopPump,
    /// Ask the feed to close the subscription.
    Close,
    /// Report a lifecycle change to the display layer.
    Emit(FeedEvent),
}

/// Lifecycle changes reported to the display layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Subscription is live.
    Subscribed,
    /// Subscription could not be opened.
    SubscribeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Subscription dropped on its own.
    Dropped {
        /// Reason for the drop.
        reason: String,
    },
    /// Subscription closed as requested.
    Closed,
    /// Teardown failed; treated as closed.
    TeardownFailed {
        /// Error message describing the failure.
        error: String,
    },
}
