//! Registry push payload and the audit event decoded from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Raw payload a container registry publishes for every push or delete.
///
/// All fields default to empty; validation decides what is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcrPayload {
    /// `INSERT`, `DELETE`, or whatever the registry sent.
    #[serde(default)]
    pub action: String,

    /// `<registry-path>@sha256:<64-hex>`
    #[serde(default)]
    pub digest: String,

    /// `<registry-path>:<tag>`
    #[serde(default)]
    pub tag: String,
}

impl GcrPayload {
    /// Create a payload from its three fields.
    pub fn new(action: impl Into<String>, digest: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            digest: digest.into(),
            tag: tag.into(),
        }
    }
}

/// Renders as `{ACTION DIGEST TAG}`. Empty fields stay empty, so a tagless
/// deletion renders with a trailing space before the brace.
impl fmt::Display for GcrPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {} {}}}", self.action, self.digest, self.tag)
    }
}

/// Registry action reported by a push notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Insert,
    Delete,
    /// Any other value, kept verbatim.
    Unknown(String),
}

impl Action {
    /// Parse the raw action string. Matching is exact and case-sensitive.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "INSERT" => Action::Insert,
            "DELETE" => Action::Delete,
            other => Action::Unknown(other.to_string()),
        }
    }

    /// The wire spelling of this action.
    pub fn as_str(&self) -> &str {
        match self {
            Action::Insert => "INSERT",
            Action::Delete => "DELETE",
            Action::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated push event, ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: Action,

    /// Full digest reference; empty for tag-only events.
    pub digest: String,

    /// Full tag reference, if the registry sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl AuditEvent {
    /// True when the event names a digest (as opposed to only a tag).
    pub fn has_digest(&self) -> bool {
        !self.digest.is_empty()
    }

    /// The reference the event is about: the digest when present, else the tag.
    pub fn subject(&self) -> &str {
        if self.has_digest() {
            &self.digest
        } else {
            self.tag.as_deref().unwrap_or_default()
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} {} {}}}",
            self.action,
            self.digest,
            self.tag.as_deref().unwrap_or_default()
        )
    }
}

/// Apply the acceptance rules to a payload. The checks run in a fixed
/// order and the first failing one wins.
pub fn validate_payload(payload: GcrPayload) -> Result<AuditEvent, ValidationError> {
    if payload.digest.is_empty() && payload.tag.is_empty() {
        return Err(ValidationError::MissingReference);
    }

    if payload.action.is_empty() {
        return Err(ValidationError::MissingAction);
    }

    match Action::parse(&payload.action) {
        Action::Insert => {}
        Action::Delete => return Err(ValidationError::DeletionProhibited(payload)),
        Action::Unknown(raw) => return Err(ValidationError::UnknownAction(raw)),
    }

    let tag = if payload.tag.is_empty() {
        None
    } else {
        Some(payload.tag)
    };

    Ok(AuditEvent {
        action: Action::Insert,
        digest: payload.digest,
        tag,
    })
}
