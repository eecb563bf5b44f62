//! Reconciliation outcomes.

use std::fmt;

use audit_protocol::{AuditEvent, Platform};
use serde::Serialize;

/// Whether an event was authorised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Verified,
    Unverified,
}

/// Why the verdict came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum MatchReason {
    /// The digest is declared for the image in the manifest.
    Direct {
        registry: String,
        image: String,
        tags: Vec<String>,
    },

    /// The digest is a platform child of a declared manifest list.
    ChildOfPromotedParent {
        registry: String,
        image: String,
        parent: String,
        platform: Platform,
    },

    /// Tag-only event whose tag is declared for the image.
    Tag {
        registry: String,
        image: String,
        digest: String,
    },

    /// The digest or tag reference could not be parsed.
    MalformedReference { detail: String },

    /// No declared registry owns the repository path.
    UnknownRegistry { path: String },

    /// The tag is not declared for the image.
    UndeclaredTag { registry: String, image: String, tag: String },

    /// Neither the direct lookup nor the child search matched.
    NoMatch { registry: String, image: String },
}

impl MatchReason {
    /// Stable short code, used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            MatchReason::Direct { .. } => "direct",
            MatchReason::ChildOfPromotedParent { .. } => "child-of-promoted-parent",
            MatchReason::Tag { .. } => "tag",
            MatchReason::MalformedReference { .. } => "malformed-reference",
            MatchReason::UnknownRegistry { .. } => "unknown-registry",
            MatchReason::UndeclaredTag { .. } => "undeclared-tag",
            MatchReason::NoMatch { .. } => "no-match",
        }
    }
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchReason::Direct { registry, image, .. } => {
                write!(f, "digest is declared for {}/{}", registry, image)
            }
            MatchReason::ChildOfPromotedParent {
                registry,
                image,
                parent,
                platform,
            } => write!(
                f,
                "digest is the {} child of {}/{}@{}",
                platform, registry, image, parent
            ),
            MatchReason::Tag { registry, image, digest } => {
                write!(f, "tag is declared for {}/{}@{}", registry, image, digest)
            }
            MatchReason::MalformedReference { detail } => write!(f, "malformed reference: {}", detail),
            MatchReason::UnknownRegistry { path } => {
                write!(f, "no promotion manifest declares a registry for {}", path)
            }
            MatchReason::UndeclaredTag { registry, image, tag } => {
                write!(f, "tag {:?} is not declared for {}/{}", tag, registry, image)
            }
            MatchReason::NoMatch { registry, image } => write!(
                f,
                "digest is neither declared for {}/{} nor a child of a declared manifest list",
                registry, image
            ),
        }
    }
}

/// Counters from the child search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Manifest lists requested from the reader.
    pub probed: usize,
    /// Requests that failed.
    pub failed: usize,
    /// Candidates skipped because the repository listing showed they are
    /// not manifest lists.
    pub skipped: usize,
}

/// The reconciler's conclusion for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub reason: MatchReason,
    pub event: AuditEvent,
    pub stats: SearchStats,
}

impl Verdict {
    pub fn verified(event: &AuditEvent, reason: MatchReason, stats: SearchStats) -> Self {
        Self {
            status: VerdictStatus::Verified,
            reason,
            event: event.clone(),
            stats,
        }
    }

    pub fn unverified(event: &AuditEvent, reason: MatchReason, stats: SearchStats) -> Self {
        Self {
            status: VerdictStatus::Unverified,
            reason,
            event: event.clone(),
            stats,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerdictStatus::Verified
    }
}
