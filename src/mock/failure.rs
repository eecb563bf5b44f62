//! Failure Injection for the Fake Registry
//!
//! Lets tests make individual registry reads fail, always or for a fixed
//! number of attempts.

use std::collections::HashMap;

/// How a read should fail.
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// HTTP status to report; `None` reports a transport failure.
    pub status: Option<u16>,
    /// Message for transport failures.
    pub message: String,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Fail with a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            fail_count: None,
        }
    }

    /// Fail with an HTTP status.
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            message: String::new(),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Per-key failure table.
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<String, FailureConfig>,
    call_counts: HashMap<String, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for a read key
    pub fn inject(&mut self, key: impl Into<String>, config: FailureConfig) {
        let key = key.into();
        self.configs.insert(key.clone(), config);
        self.call_counts.insert(key, 0);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Returns the failure to produce for this call, if any.
    pub fn check(&mut self, key: &str) -> Option<&FailureConfig> {
        let config = self.configs.get(key)?;
        let count = self.call_counts.entry(key.to_string()).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None;
            }
        }
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_injector_basic() {
        let mut injector = FailureInjector::new();
        assert!(injector.check("gcr.io/a/b@sha256:1").is_none());

        injector.inject("gcr.io/a/b@sha256:1", FailureConfig::status(503));
        let config = injector.check("gcr.io/a/b@sha256:1");
        assert_eq!(config.unwrap().status, Some(503));
    }

    #[test]
    fn test_failure_injector_fail_count() {
        let mut injector = FailureInjector::new();
        injector.inject("k", FailureConfig::transport("reset").with_fail_count(2));

        assert!(injector.check("k").is_some());
        assert!(injector.check("k").is_some());
        assert!(injector.check("k").is_none());
    }

    #[test]
    fn test_failure_injector_clear() {
        let mut injector = FailureInjector::new();
        injector.inject("k", FailureConfig::transport("reset"));
        injector.clear();
        assert!(injector.check("k").is_none());
    }
}
