//! Runtime configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Configuration for the runtime host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Outbound HTTP settings for the `httpFetch` host function.
    #[serde(default)]
    pub http: HttpSettings,

    /// Period of the engine epoch ticker, in milliseconds. Bounds how
    /// quickly a cancelled invocation's guest code is interrupted.
    #[serde(default = "default_epoch_tick_ms")]
    pub epoch_tick_ms: u64,
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Hosts guests may fetch from. Empty means all outbound requests are
    /// refused.
    #[serde(default)]
    pub allowed_hosts: Vec<String>,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_epoch_tick_ms() -> u64 {
    10
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            http: HttpSettings::default(),
            epoch_tick_ms: default_epoch_tick_ms(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::Config(e.to_string()))
    }
}

impl HttpSettings {
    /// Whether outbound requests to the given host are allowed.
    pub fn is_host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.iter().any(|h| h == host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config.epoch_tick_ms, 10);
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.http.allowed_hosts.is_empty());
    }

    #[test]
    fn test_host_allow_list() {
        let config = RuntimeConfig::from_json(
            r#"{"http": {"allowed_hosts": ["api.example.com"], "timeout_secs": 5}}"#,
        )
        .unwrap();
        assert!(config.http.is_host_allowed("api.example.com"));
        assert!(!config.http.is_host_allowed("evil.example.com"));
        assert_eq!(config.http.timeout_secs, 5);
    }
}
