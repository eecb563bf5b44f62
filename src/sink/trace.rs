//! Sinks that forward to the process-wide `tracing` subscriber.

use tracing::{debug, error, info, warn};

use super::{EventContext, LogLevel, LogRecord, LoggingFacility, ReportingFacility};
use crate::audit::AuditError;

/// Emits each record as a `tracing` event; fields are rendered into a
/// single `fields` value because their keys are only known at runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl LoggingFacility for TracingLogger {
    fn log(&self, record: LogRecord) {
        let fields = record
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");

        match record.level {
            LogLevel::Debug => debug!(target: "promo_audit::audit", fields = %fields, "{}", record.message),
            LogLevel::Info => info!(target: "promo_audit::audit", fields = %fields, "{}", record.message),
            LogLevel::Warn => warn!(target: "promo_audit::audit", fields = %fields, "{}", record.message),
            LogLevel::Error => error!(target: "promo_audit::audit", fields = %fields, "{}", record.message),
        }
    }
}

/// Reports errors as `ERROR` events on the `promo_audit::report` target,
/// which deployments route to their alerting pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ReportingFacility for TracingReporter {
    fn report(&self, err: &AuditError, context: &EventContext) {
        let event = context
            .event
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();

        error!(
            target: "promo_audit::report",
            request_id = %context.request_id,
            message_id = context.message_id.as_deref().unwrap_or_default(),
            event = %event,
            kind = err.kind(),
            "{}",
            err
        );
    }
}
