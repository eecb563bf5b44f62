//! Sinks that keep everything in memory.

use std::sync::{Mutex, PoisonError};

use crate::audit::AuditError;
use crate::sink::{EventContext, LogLevel, LogRecord, LoggingFacility, ReportingFacility};

/// Records every log record.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn records_at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records().into_iter().filter(|r| r.level == level).collect()
    }

    /// INFO records rendered one per line.
    pub fn info_buffer(&self) -> String {
        self.records_at(LogLevel::Info)
            .iter()
            .map(|r| format!("{}\n", r))
            .collect()
    }
}

impl LoggingFacility for RecordingLogger {
    fn log(&self, record: LogRecord) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}

/// A report as the reporter saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub kind: &'static str,
    pub message: String,
    pub context: EventContext,
}

/// Records every report.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<ReportedError>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ReportedError> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ReportingFacility for RecordingReporter {
    fn report(&self, error: &AuditError, context: &EventContext) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ReportedError {
                kind: error.kind(),
                message: error.to_string(),
                context: context.clone(),
            });
    }
}
