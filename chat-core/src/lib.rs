//! # chat-core
//!
//! Pure logic for chatsync (no I/O, instant tests).
//!
//! This crate implements the merge engine and the subscription state machine
//! without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`MergeEngine`] folds snapshots and live events into one ordered,
//!   duplicate-free message sequence
//! - [`SubscriptionState`] turns lifecycle events into actions
//! - [`SyncStatus`] collects advisory state for the display layer
//!
//! The actual I/O (store queries, live feeds) and the single-writer actor
//! that owns a [`MergeEngine`] live in `chat-client`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod merge;
pub mod status;
pub mod subscription;

pub use merge::{Applied, MergeEngine};
pub use status::{Advisory, ConversationView, SnapshotStatus, SyncStatus, MAX_ADVISORIES};
pub use subscription::{Action, Event, FeedEvent, SubscriptionState};
