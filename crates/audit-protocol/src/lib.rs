//! Promotion Audit Protocol Types
//!
//! Defines the push-notification envelope delivered to the audit webhook,
//! the registry payload carried inside it, and the registry documents the
//! auditor reads back (repository listings and manifest lists).

pub mod envelope;
pub mod error;
pub mod event;
pub mod reference;
pub mod registry;

pub use envelope::{decode_envelope, PushEnvelope, PushMessage};
pub use error::{DecodeError, ReferenceError, ValidationError};
pub use event::{validate_payload, Action, AuditEvent, GcrPayload};
pub use reference::{is_canonical_digest, DigestReference, TagReference};
pub use registry::{ManifestInfo, ManifestList, ManifestListEntry, Platform, RepoListing};

/// Digest algorithm prefix accepted in references and manifests.
pub const DIGEST_PREFIX: &str = "sha256:";
