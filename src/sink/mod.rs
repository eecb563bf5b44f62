//! Logging and error-reporting sinks.
//!
//! The auditor writes every disposition to one of two sinks and never
//! reads anything back from them. Production forwards both to `tracing`;
//! tests record them (see [`crate::mock`]).

mod trace;

pub use trace::{TracingLogger, TracingReporter};

use std::collections::BTreeMap;
use std::fmt;

use audit_protocol::AuditEvent;
use serde::Serialize;

use crate::audit::AuditError;

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// A structured log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// Attach a field.
    pub fn field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.fields.insert(key.into(), value.to_string());
        self
    }
}

/// `message key=value key=value`
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// What the reporter knows about the request an error belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventContext {
    pub request_id: String,

    /// The decoded event, when decoding got that far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<AuditEvent>,

    /// Transport message ID from the envelope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl EventContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }

    pub fn with_event(mut self, event: AuditEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.is_empty() {
            self.message_id = Some(id);
        }
        self
    }
}

/// Structured log sink.
pub trait LoggingFacility: Send + Sync {
    fn log(&self, record: LogRecord);
}

/// Error-report sink. Every validation failure and every unverified
/// transaction lands here exactly once.
pub trait ReportingFacility: Send + Sync {
    fn report(&self, error: &AuditError, context: &EventContext);
}
