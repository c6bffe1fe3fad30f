//! Identity types for chatsync.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ParseError;

/// A participant in a conversation (a username or phone number).
///
/// Never empty and never whitespace-only.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a participant identifier, rejecting blank input.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ParseError::EmptyParticipant);
        }
        Ok(Self(id))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

/// Identifier assigned by the remote store to a persisted message.
///
/// Stores hand these out as integers or strings; both are kept in their
/// decimal/string form so equality is a plain string comparison.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Wrap a store-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerId({})", self.0)
    }
}

/// Canonical identifier of the conversation between two participants.
///
/// The pair is stored in lexicographic order, so `new(a, b) == new(b, a)`
/// and both ends of a chat address the same snapshot query and live
/// subscription regardless of who is local.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    first: ParticipantId,
    second: ParticipantId,
}

impl ConversationKey {
    /// Separator placed between the two participants in the rendered key.
    pub const SEPARATOR: char = '_';

    /// Derive the key for a pair of participants, in either order.
    pub fn new(a: &ParticipantId, b: &ParticipantId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first: first.clone(),
            second: second.clone(),
        }
    }

    /// The lexicographically smaller participant.
    pub fn first(&self) -> &ParticipantId {
        &self.first
    }

    /// The lexicographically larger participant.
    pub fn second(&self) -> &ParticipantId {
        &self.second
    }

    /// Check whether `id` takes part in this conversation.
    pub fn contains(&self, id: &ParticipantId) -> bool {
        &self.first == id || &self.second == id
    }

    /// The symmetric participant filter: true when the message travels
    /// between the two participants, in either direction.
    pub fn matches(&self, sender: &ParticipantId, receiver: &ParticipantId) -> bool {
        (sender == &self.first && receiver == &self.second)
            || (sender == &self.second && receiver == &self.first)
    }

    /// The other participant, as seen from `me`.
    ///
    /// Returns `None` if `me` is not part of the conversation.
    pub fn peer_of(&self, me: &ParticipantId) -> Option<&ParticipantId> {
        if &self.first == me {
            Some(&self.second)
        } else if &self.second == me {
            Some(&self.first)
        } else {
            None
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.first, Self::SEPARATOR, self.second)
    }
}

impl fmt::Debug for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversationKey({self})")
    }
}
