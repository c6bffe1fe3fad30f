//! Wire form of a message as stored by, and pushed from, the remote store.
//!
//! Records come in as loosely typed JSON rows `{id?, sender, receiver,
//! content, type, timestamp, created_at?}`. Decoding is done one record at a
//! time so a single bad row never takes the rest of a batch with it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Message, MessageKind, ParseError, ParticipantId, ServerId};

/// What to do with a record whose client timestamp is missing or invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPolicy {
    /// Reject the record with [`ParseError::MissingTimestamp`].
    Required,
    /// Substitute the given local receipt time (milliseconds).
    ReceivedAt(i64),
}

/// Canonical outgoing record, as written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Store-assigned identifier (omitted on insert).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ServerId>,
    /// Sender identifier.
    pub sender: String,
    /// Receiver identifier.
    pub receiver: String,
    /// Text payload or file URL.
    pub content: String,
    /// `"text"` or `"file"`.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Client timestamp in milliseconds.
    pub timestamp: i64,
    /// Server creation time (ISO 8601), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        Self {
            id: message.server_id().cloned(),
            sender: message.sender().to_string(),
            receiver: message.receiver().to_string(),
            content: message.content().to_string(),
            kind: message.kind(),
            timestamp: message.client_timestamp(),
            created_at: message.server_created_at().map(str::to_string),
        }
    }
}

/// Lenient incoming shape; unknown fields are ignored.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<Value>,
    sender: String,
    receiver: String,
    content: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    created_at: Option<String>,
}

impl MessageRecord {
    /// Decode one JSON row into a [`Message`].
    pub fn decode(value: &Value, policy: TimestampPolicy) -> Result<Message, ParseError> {
        let raw = RawRecord::deserialize(value).map_err(ParseError::Malformed)?;

        let sender = participant("sender", raw.sender)?;
        let receiver = participant("receiver", raw.receiver)?;
        let kind = MessageKind::parse(&raw.kind)?;
        if kind == MessageKind::File && raw.content.trim().is_empty() {
            return Err(ParseError::InvalidField {
                field: "content",
                reason: "file message without a url".into(),
            });
        }

        let timestamp = match (raw.timestamp.as_ref().and_then(parse_timestamp), policy) {
            (Some(ts), _) => ts,
            (None, TimestampPolicy::ReceivedAt(now)) => now,
            (None, TimestampPolicy::Required) => return Err(ParseError::MissingTimestamp),
        };

        let mut message = Message::new(sender, receiver, raw.content, kind, timestamp);
        if let Some(id) = raw.id.as_ref().map(parse_id).transpose()?.flatten() {
            message = message.with_server_id(id);
        }
        if let Some(created_at) = raw.created_at {
            message = message.with_server_created_at(created_at);
        }
        Ok(message)
    }
}

fn participant(field: &'static str, raw: String) -> Result<ParticipantId, ParseError> {
    ParticipantId::new(raw).map_err(|_| ParseError::InvalidField {
        field,
        reason: "empty".into(),
    })
}

/// Integers and numeric strings are accepted; anything negative is invalid.
fn parse_timestamp(value: &Value) -> Option<i64> {
    let ts = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (ts >= 0).then_some(ts)
}

fn parse_id(value: &Value) -> Result<Option<ServerId>, ParseError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(Some(ServerId::new(n.to_string()))),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(ServerId::new(s.clone()))),
        other => Err(ParseError::InvalidField {
            field: "id",
            reason: format!("unexpected value {other}"),
        }),
    }
}
