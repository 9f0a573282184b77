//! Queue configuration, loaded from TOML.
//!
//! ```toml
//! service_name = "billing"
//! queue_name = "invoice-due"
//! hostname = "worker-1"
//! poll_interval_ms = 250
//!
//! [retry]
//! base_delay_ms = 2000
//! multiplier = 2.0
//! max_retries = 5
//! ```
//!
//! Every field is optional.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::NotifqError;
use crate::queue::ExponentialBackoff;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub service_name: String,
    pub queue_name: String,
    pub hostname: String,
    pub poll_interval_ms: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            service_name: "notifq".to_string(),
            queue_name: "default".to_string(),
            hostname: default_hostname(),
            poll_interval_ms: 100,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            multiplier: 2.0,
            max_retries: 5,
        }
    }
}

fn default_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

impl QueueConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, NotifqError> {
        let config: Self = toml::from_str(s).map_err(|e| NotifqError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, NotifqError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NotifqError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), NotifqError> {
        if self.service_name.is_empty() || self.queue_name.is_empty() {
            return Err(NotifqError::Config("service_name and queue_name must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(NotifqError::Config("poll_interval_ms must be > 0".to_string()));
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return Err(NotifqError::Config("retry.multiplier must be finite and >= 1.0".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.retry.base_delay_ms),
            self.retry.multiplier,
            self.retry.max_retries,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = QueueConfig::from_toml_str("").unwrap();
        assert_eq!(config.service_name, "notifq");
        assert_eq!(config.queue_name, "default");
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.retry, RetryConfig::default());
        assert!(!config.hostname.is_empty());
    }

    #[test]
    fn parses_all_fields() {
        let config = QueueConfig::from_toml_str(
            r#"
            service_name = "billing"
            queue_name = "invoice-due"
            hostname = "worker-1"
            poll_interval_ms = 250

            [retry]
            base_delay_ms = 500
            multiplier = 3.0
            max_retries = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.hostname, "worker-1");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));

        let policy = config.retry_policy();
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.multiplier, 3.0);
        assert_eq!(policy.max_retries, 2);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let err = QueueConfig::from_toml_str("poll_interval_ms = 0").unwrap_err();
        assert!(matches!(err, NotifqError::Config(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = QueueConfig::from_toml_str("service_name = ").unwrap_err();
        assert!(matches!(err, NotifqError::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = QueueConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("here.toml"));
    }
}
