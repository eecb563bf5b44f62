//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Listen address (default: 0.0.0.0:8080)
    pub bind: String,

    /// Request worker threads (default: 4)
    pub workers: u64,

    /// Largest accepted request body (default: 1 MiB)
    pub max_body_bytes: u64,

    /// Directory holding promotion manifests (default: "manifests")
    pub manifests_dir: String,

    /// Registry URL scheme (default: "https")
    pub registry_scheme: String,

    /// Registry request timeout in milliseconds (default: 10000)
    pub registry_timeout_ms: u64,

    /// Log level when RUST_LOG is unset (default: "info")
    pub log_level: String,

    /// Log output format (default: "text")
    pub log_format: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            workers: 4,
            max_body_bytes: 1024 * 1024,
            manifests_dir: "manifests".to_string(),
            registry_scheme: "https".to_string(),
            registry_timeout_ms: 10_000,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "server": {
                "bind": self.bind,
                "workers": self.workers,
                "max_body_bytes": self.max_body_bytes
            },
            "manifests": {
                "dir": self.manifests_dir
            },
            "registry": {
                "scheme": self.registry_scheme,
                "timeout_ms": self.registry_timeout_ms
            },
            "audit": {},
            "logging": {
                "level": self.log_level,
                "format": self.log_format
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.bind, "0.0.0.0:8080");
        assert_eq!(defaults.workers, 4);
        assert_eq!(defaults.max_body_bytes, 1_048_576);
        assert_eq!(defaults.registry_timeout_ms, 10_000);
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();
        assert_eq!(value["server"]["workers"], 4);
        assert_eq!(value["manifests"]["dir"], "manifests");
        assert_eq!(value["logging"]["format"], "text");
        assert!(value["registry"].get("token").is_none());
    }
}
