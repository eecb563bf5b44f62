//! Error types for decoding push notifications.
//!
//! The `Display` text of [`ValidationError`] is consumed by alerting rules
//! and must stay byte-for-byte stable.

use crate::event::GcrPayload;

/// Semantic rejection of a structurally valid payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Both `digest` and `tag` were empty.
    #[error("neither Digest nor Tag was specified")]
    MissingReference,

    /// `action` was empty.
    #[error("Action not specified")]
    MissingAction,

    /// The registry reported a deletion. Carries the whole payload so the
    /// report shows exactly what was removed.
    #[error("{0}: deletions are prohibited")]
    DeletionProhibited(GcrPayload),

    /// `action` was something other than INSERT or DELETE.
    #[error("unknown action {0:?}")]
    UnknownAction(String),
}

/// Failure to turn a request body into an audit event.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The envelope itself is not valid JSON of the expected shape.
    #[error("invalid push envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// `message.data` is not valid base64.
    #[error("invalid message data encoding: {0}")]
    Encoding(#[source] base64::DecodeError),

    /// The decoded `message.data` is not a valid registry payload.
    #[error("invalid registry payload: {0}")]
    Payload(#[source] serde_json::Error),

    /// The payload parsed but is not an acceptable event.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl DecodeError {
    /// Returns true if the body could not be parsed at all, as opposed to
    /// parsing into a disallowed event.
    pub fn is_structural(&self) -> bool {
        !matches!(self, DecodeError::Invalid(_))
    }

    /// The validation failure, if this is a semantic rejection.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            DecodeError::Invalid(e) => Some(e),
            _ => None,
        }
    }
}

/// Malformed image reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("reference {0:?} has no '@' digest separator")]
    MissingDigestSeparator(String),

    #[error("reference {0:?} has no ':' tag separator")]
    MissingTagSeparator(String),

    #[error("reference {0:?} has an empty repository path")]
    EmptyPath(String),

    #[error("reference {0:?} has an empty tag")]
    EmptyTag(String),

    #[error("digest {0:?} is not of the form sha256:<64 hex>")]
    InvalidDigest(String),
}
