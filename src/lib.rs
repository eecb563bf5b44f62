//! Promotion Audit Webhook
//!
//! Receives registry push notifications, decodes them, and checks each
//! pushed digest against the promotion manifests. Pushes the manifests
//! explain are logged as `TRANSACTION VERIFIED`; everything else is
//! reported.

pub mod audit;
pub mod config;
pub mod logging;
pub mod manifest;
pub mod mock;
pub mod reader;
pub mod server;
pub mod signal;
pub mod sink;

pub use audit::{AuditError, MatchReason, Reconciler, Verdict, VerdictStatus};
pub use config::{AuditConfig, EffectiveConfig};
pub use manifest::{DirectoryManifestSource, Manifest, ManifestIndex, ManifestSource};
pub use reader::{HttpRegistryReader, RegistryReader};
pub use server::{Acknowledgment, AuditService, Disposition};
