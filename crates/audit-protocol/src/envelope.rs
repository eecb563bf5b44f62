//! Push Envelope Types
//!
//! The notification transport wraps each registry payload in an envelope:
//!
//! ```json
//! {"message": {"data": "<base64 payload>", "id": "1"}, "subscription": "2"}
//! ```
//!
//! `data` is the registry payload JSON encoded as standard base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::event::{validate_payload, AuditEvent, GcrPayload};

/// Inner message of a push envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Base64 text of the payload JSON.
    pub data: String,

    /// Transport-assigned message ID.
    #[serde(default)]
    pub id: String,
}

/// Push envelope as delivered to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,

    /// Subscription the message was delivered on.
    #[serde(default)]
    pub subscription: String,
}

impl PushEnvelope {
    /// Wrap a payload for delivery. Used by tests and the replay tooling.
    pub fn wrap(payload: &GcrPayload, id: impl Into<String>, subscription: impl Into<String>) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(Self {
            message: PushMessage {
                data: STANDARD.encode(bytes),
                id: id.into(),
            },
            subscription: subscription.into(),
        })
    }

    /// Parse an envelope from a request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(body).map_err(DecodeError::Envelope)
    }

    /// Decode `message.data` into the raw registry payload.
    pub fn payload(&self) -> Result<GcrPayload, DecodeError> {
        let bytes = STANDARD
            .decode(self.message.data.trim())
            .map_err(DecodeError::Encoding)?;
        serde_json::from_slice(&bytes).map_err(DecodeError::Payload)
    }

    /// Decode and validate the payload into an audit event.
    pub fn decode(&self) -> Result<AuditEvent, DecodeError> {
        let payload = self.payload()?;
        Ok(validate_payload(payload)?)
    }
}

/// Decode a raw request body into an audit event.
///
/// Structural problems (bad JSON, bad base64) and semantic rejections are
/// both reported as [`DecodeError`]; see [`DecodeError::is_structural`].
pub fn decode_envelope(body: &[u8]) -> Result<AuditEvent, DecodeError> {
    PushEnvelope::from_slice(body)?.decode()
}
