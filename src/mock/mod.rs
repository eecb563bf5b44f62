//! Test Doubles
//!
//! In-memory stand-ins for the registry and the two sinks, used by unit and
//! integration tests.
//!
//! - [`FakeRegistryReader`]: keyed listings and manifest lists, with
//!   per-key failure injection
//! - [`RecordingLogger`]: keeps every log record
//! - [`RecordingReporter`]: keeps every report

mod failure;
mod reader;
mod sinks;

pub use failure::{FailureConfig, FailureInjector};
pub use reader::FakeRegistryReader;
pub use sinks::{RecordingLogger, RecordingReporter, ReportedError};
