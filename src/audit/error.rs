//! Errors handed to the reporting sink.

use audit_protocol::DecodeError;

/// Everything the auditor can report.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The request body could not be turned into an acceptable event. The
    /// message is the decoder's, unchanged.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The search found nothing authorising the event.
    #[error("TRANSACTION REJECTED: {subject}: {reason}")]
    Unverified { subject: String, reason: String },
}

impl AuditError {
    /// Short machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditError::Decode(e) if e.is_structural() => "decode",
            AuditError::Decode(_) => "validation",
            AuditError::Unverified { .. } => "unverified",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_protocol::ValidationError;

    #[test]
    fn test_validation_message_passes_through() {
        let err = AuditError::from(DecodeError::from(ValidationError::MissingReference));
        assert_eq!(err.to_string(), "neither Digest nor Tag was specified");
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_unverified_message() {
        let err = AuditError::Unverified {
            subject: "gcr.io/a/b@sha256:1".to_string(),
            reason: "no match".to_string(),
        };
        assert_eq!(err.to_string(), "TRANSACTION REJECTED: gcr.io/a/b@sha256:1: no match");
        assert_eq!(err.kind(), "unverified");
    }
}
