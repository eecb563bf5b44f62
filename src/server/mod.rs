//! Webhook Handler
//!
//! Turns one request body into one acknowledgment:
//!
//! - body is not a decodable envelope: 400, reported
//! - payload fails validation: 200, reported
//! - event reconciled: 200, verified record logged or unverified reported
//!
//! The manifest snapshot is loaded when the service is built, so a broken
//! manifest fails startup. Each request reloads it; a reload that fails is
//! logged and the previous snapshot is used.
//!
//! Each request gets a ULID request id and exactly one disposition.

mod listener;

pub use listener::{Listener, ServeError, ShutdownHandle};

use std::sync::{Arc, PoisonError, RwLock};

use audit_protocol::{AuditEvent, DecodeError, PushEnvelope};
use serde::Serialize;
use tracing::{info, info_span};
use ulid::Ulid;

use crate::audit::{AuditError, MatchReason, Reconciler};
use crate::manifest::{ManifestError, ManifestIndex, ManifestSource};
use crate::sink::{EventContext, LogRecord};

/// What happened to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Disposition {
    /// The event is authorised by the manifest.
    Verified { event: AuditEvent, reason: MatchReason },

    /// The event is not authorised; reported.
    Unverified { event: AuditEvent, reason: MatchReason },

    /// The payload decoded but was rejected; reported.
    Invalid { message: String },

    /// The body could not be decoded; reported.
    Malformed { message: String },
}

impl Disposition {
    fn label(&self) -> &'static str {
        match self {
            Disposition::Verified { .. } => "verified",
            Disposition::Unverified { .. } => "unverified",
            Disposition::Invalid { .. } => "invalid",
            Disposition::Malformed { .. } => "malformed",
        }
    }
}

/// Response to the push transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgment {
    pub status: u16,
    pub request_id: String,
    pub disposition: Disposition,
}

impl Acknowledgment {
    /// True when the transport should consider the message delivered.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The audit webhook, independent of any HTTP server.
pub struct AuditService {
    source: Box<dyn ManifestSource>,
    snapshot: RwLock<Arc<ManifestIndex>>,
    reconciler: Reconciler,
}

impl AuditService {
    /// Load and index the manifests. Fails when they cannot be read or a
    /// registry is declared twice.
    pub fn new(source: Box<dyn ManifestSource>, reconciler: Reconciler) -> Result<Self, ManifestError> {
        let index = source.fetch().and_then(ManifestIndex::build)?;
        Ok(Self {
            source,
            snapshot: RwLock::new(Arc::new(index)),
            reconciler,
        })
    }

    /// Reload the manifests, falling back to the last good snapshot.
    pub fn snapshot(&self) -> Arc<ManifestIndex> {
        match self.source.fetch().and_then(ManifestIndex::build) {
            Ok(index) => {
                let index = Arc::new(index);
                *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&index);
                index
            }
            Err(e) => {
                self.reconciler.logger().log(
                    LogRecord::warn("manifest reload failed, using previous snapshot").field("error", e),
                );
                Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
            }
        }
    }

    pub fn handle(&self, body: &[u8]) -> Acknowledgment {
        self.handle_with_id(Ulid::new().to_string(), body)
    }

    pub fn handle_with_id(&self, request_id: String, body: &[u8]) -> Acknowledgment {
        let span = info_span!("audit", request_id = %request_id);
        let _enter = span.enter();

        let (status, disposition) = self.process(&request_id, body);
        info!(status, outcome = disposition.label(), "request handled");

        Acknowledgment {
            status,
            request_id,
            disposition,
        }
    }

    fn process(&self, request_id: &str, body: &[u8]) -> (u16, Disposition) {
        let mut context = EventContext::new(request_id);

        let envelope = match PushEnvelope::from_slice(body) {
            Ok(envelope) => envelope,
            Err(e) => return self.reject_decode(e, &context),
        };
        context = context.with_message_id(envelope.message.id.clone());

        let event = match envelope.decode() {
            Ok(event) => event,
            Err(e) => return self.reject_decode(e, &context),
        };
        context = context.with_event(event.clone());

        let index = self.snapshot();
        let verdict = self.reconciler.audit(&index, &event, &context);
        let disposition = if verdict.is_verified() {
            Disposition::Verified {
                event: verdict.event,
                reason: verdict.reason,
            }
        } else {
            Disposition::Unverified {
                event: verdict.event,
                reason: verdict.reason,
            }
        };
        (200, disposition)
    }

    fn reject_decode(&self, err: DecodeError, context: &EventContext) -> (u16, Disposition) {
        let structural = err.is_structural();
        let err = AuditError::Decode(err);
        let message = err.to_string();
        self.reconciler.reporter().report(&err, context);

        if structural {
            (400, Disposition::Malformed { message })
        } else {
            (200, Disposition::Invalid { message })
        }
    }
}
