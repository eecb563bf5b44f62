//! Typed view of the merged configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::effective::ConfigError;
use crate::reader::HttpReaderConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub workers: usize,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestsConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub scheme: String,
    pub timeout_ms: u64,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Upper bound on manifest-list reads per event.
    #[serde(default)]
    pub max_candidates: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

/// Everything the binary needs to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    pub server: ServerConfig,
    pub manifests: ManifestsConfig,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub audit: AuditSettings,
    pub logging: LoggingConfig,
}

impl AuditConfig {
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: AuditConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.workers == 0 || self.server.workers > 256 {
            return Err(ConfigError::ValidationError(
                "server.workers must be in [1, 256]".to_string(),
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_body_bytes must be positive".to_string(),
            ));
        }

        self.bind_addr()?;

        if self.registry.timeout_ms == 0 || self.registry.timeout_ms > 300_000 {
            return Err(ConfigError::ValidationError(
                "registry.timeout_ms must be in (0, 300000]".to_string(),
            ));
        }

        if self.registry.scheme != "https" && self.registry.scheme != "http" {
            return Err(ConfigError::ValidationError(format!(
                "registry.scheme must be \"https\" or \"http\", got {:?}",
                self.registry.scheme
            )));
        }

        if self.audit.max_candidates == Some(0) {
            return Err(ConfigError::ValidationError(
                "audit.max_candidates must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind.parse().map_err(|e| {
            ConfigError::ValidationError(format!("server.bind {:?} is not a socket address: {}", self.server.bind, e))
        })
    }

    pub fn reader_config(&self) -> HttpReaderConfig {
        HttpReaderConfig {
            scheme: self.registry.scheme.clone(),
            timeout_ms: self.registry.timeout_ms,
            token: self.registry.token.clone().filter(|t| !t.is_empty()),
            ..HttpReaderConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuiltinDefaults;
    use crate::config::deep_merge;
    use serde_json::json;

    fn with(overlay: serde_json::Value) -> Result<AuditConfig, ConfigError> {
        AuditConfig::from_value(deep_merge(BuiltinDefaults::default().to_value(), overlay))
    }

    #[test]
    fn test_defaults_deserialize() {
        let config = with(json!({})).unwrap();
        assert_eq!(config.server.workers, 4);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.audit.max_candidates, None);
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = with(json!({"logging": {"format": "xml"}})).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    fn test_ranges() {
        assert!(with(json!({"server": {"workers": 0}})).is_err());
        assert!(with(json!({"server": {"workers": 257}})).is_err());
        assert!(with(json!({"registry": {"timeout_ms": 300001}})).is_err());
        assert!(with(json!({"server": {"bind": "not an address"}})).is_err());
        assert!(with(json!({"audit": {"max_candidates": 0}})).is_err());
        assert!(with(json!({"server": {"workers": 256}})).is_ok());
    }

    #[test]
    fn test_reader_config_drops_empty_token() {
        let config = with(json!({"registry": {"token": ""}})).unwrap();
        assert_eq!(config.reader_config().token, None);
        let config = with(json!({"registry": {"token": "abc", "scheme": "http"}})).unwrap();
        let reader = config.reader_config();
        assert_eq!(reader.token.as_deref(), Some("abc"));
        assert_eq!(reader.scheme, "http");
    }
}
