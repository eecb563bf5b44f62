//! Configuration merge system
//!
//! Three layers, later ones winning:
//! 1. Built-in defaults
//! 2. Config file (`--config`, or `promo-audit.toml` when present)
//! 3. CLI flags
//!
//! The merged JSON value is deserialized into [`AuditConfig`] before
//! secrets are redacted; only the printed view is redacted.

mod defaults;
mod effective;
mod merge;
mod settings;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers};
pub use settings::{AuditConfig, AuditSettings, LogFormat, LoggingConfig, ManifestsConfig, RegistryConfig, ServerConfig};

/// File picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "promo-audit.toml";
