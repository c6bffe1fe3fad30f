//! The chat message value.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ParseError, ParticipantId, ServerId};

/// What a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// An uploaded file; the content is its retrieval URL.
    File,
}

impl MessageKind {
    /// Wire discriminator (`"text"` / `"file"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
        }
    }

    /// Parse a wire discriminator, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("text") {
            Ok(Self::Text)
        } else if trimmed.eq_ignore_ascii_case("file") {
            Ok(Self::File)
        } else {
            Err(ParseError::UnknownKind(raw.to_string()))
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable chat message.
///
/// `client_timestamp` (milliseconds, set by the sender) is the only ordering
/// key. `server_id` is present once the remote store has persisted the
/// message; `server_created_at` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    sender: ParticipantId,
    receiver: ParticipantId,
    content: String,
    kind: MessageKind,
    client_timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_id: Option<ServerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_created_at: Option<String>,
}

impl Message {
    /// Compose a new, not yet confirmed message.
    pub fn new(
        sender: ParticipantId,
        receiver: ParticipantId,
        content: impl Into<String>,
        kind: MessageKind,
        client_timestamp: i64,
    ) -> Self {
        Self {
            sender,
            receiver,
            content: content.into(),
            kind,
            client_timestamp,
            server_id: None,
            server_created_at: None,
        }
    }

    /// Attach the store-assigned identifier.
    pub fn with_server_id(mut self, id: ServerId) -> Self {
        self.server_id = Some(id);
        self
    }

    /// Attach the store-assigned creation timestamp.
    pub fn with_server_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.server_created_at = Some(created_at.into());
        self
    }

    /// Who sent the message.
    pub fn sender(&self) -> &ParticipantId {
        &self.sender
    }

    /// Who the message is addressed to.
    pub fn receiver(&self) -> &ParticipantId {
        &self.receiver
    }

    /// Text payload, or the file URL for [`MessageKind::File`].
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Message kind.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Sender-assigned creation time in milliseconds.
    pub fn client_timestamp(&self) -> i64 {
        self.client_timestamp
    }

    /// Store-assigned identifier, if the message has been persisted.
    pub fn server_id(&self) -> Option<&ServerId> {
        self.server_id.as_ref()
    }

    /// Store-assigned creation timestamp, if known.
    pub fn server_created_at(&self) -> Option<&str> {
        self.server_created_at.as_deref()
    }

    /// True once the remote store has confirmed the message.
    pub fn is_confirmed(&self) -> bool {
        self.server_id.is_some()
    }

    /// Dedup identity check.
    ///
    /// Equal server ids always identify the same message. Otherwise two
    /// messages are the same when `(sender, content, client_timestamp)`
    /// match, so a confirmed copy merges with its unconfirmed original.
    pub fn same_as(&self, other: &Message) -> bool {
        if let (Some(a), Some(b)) = (&self.server_id, &other.server_id) {
            if a == b {
                return true;
            }
        }
        self.client_timestamp == other.client_timestamp
            && self.sender == other.sender
            && self.content == other.content
    }
}
