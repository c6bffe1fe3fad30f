//! # chat-types
//!
//! Message and conversation identity types for chatsync.
//!
//! This crate provides the foundational types used across all chatsync crates:
//! - [`ParticipantId`], [`ServerId`], [`ConversationKey`] - Identity types
//! - [`Message`], [`MessageKind`] - The immutable chat message value
//! - [`MessageRecord`] - Lenient wire form of a stored or pushed message
//! - [`ParseError`] - Per-record decoding failures

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod message;
mod record;

pub use error::ParseError;
pub use ids::{ConversationKey, ParticipantId, ServerId};
pub use message::{Message, MessageKind};
pub use record::{MessageRecord, TimestampPolicy};
