//! Error types for chatsync records.

use thiserror::Error;

/// A single message record could not be turned into a [`Message`](crate::Message).
///
/// Always scoped to one record: callers skip the record and carry on.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Participant identifier is blank.
    #[error("participant identifier is empty")]
    EmptyParticipant,

    /// Record does not have the expected shape.
    #[error("malformed record: {0}")]
    Malformed(#[source] serde_json::Error),

    /// A field is present but unusable.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending wire field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Message type discriminator is not one we know.
    #[error("unknown message type: {0}")]
    UnknownKind(String),

    /// Record has no usable client timestamp and none may be substituted.
    #[error("missing or invalid client timestamp")]
    MissingTimestamp,
}
