//! Agent configuration
//!
//! Defines the connection settings for the coordinator and the logging
//! configuration. Values come from command-line flags with environment
//! variable fallbacks (see `main.rs`).

use anyhow::Context;
use kite_client::AgentClient;
use std::time::Duration;

use crate::logger::LogConfig;

/// Agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Agent API base URL (e.g., "https://agent.example.com/v3")
    pub endpoint: String,

    /// Access token used for calls not scoped to a job
    pub access_token: Option<String>,

    /// Maximum time a single request may take
    pub request_timeout: Duration,

    /// Logging configuration, passed explicitly to the logger
    pub log: LogConfig,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            access_token: None,
            request_timeout: Duration::from_secs(60),
            log: LogConfig::default(),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.endpoint.is_empty() {
            anyhow::bail!("endpoint cannot be empty");
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            anyhow::bail!("endpoint must start with http:// or https://");
        }

        if self.access_token.as_deref() == Some("") {
            anyhow::bail!("access token cannot be empty when set");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        Ok(())
    }

    /// Builds the agent API client described by this configuration
    pub fn client(&self) -> anyhow::Result<AgentClient> {
        let http_client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let mut client = AgentClient::with_client(&self.endpoint, http_client)
            .with_user_agent(format!("kite-agent/{}", env!("CARGO_PKG_VERSION")));
        if let Some(token) = &self.access_token {
            client = client.with_token(token);
        }

        Ok(client)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("https://agent.buildkite.com/v3".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.access_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Invalid URL should fail
        config.endpoint = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.endpoint = "http://localhost:3000/v3".to_string();
        assert!(config.validate().is_ok());

        // Blank token should fail
        config.access_token = Some(String::new());
        assert!(config.validate().is_err());

        config.access_token = Some("token".to_string());
        config.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_uses_endpoint() {
        let config = Config::new("http://localhost:3000/v3/".to_string());
        let client = config.client().unwrap();
        assert_eq!(client.endpoint(), "http://localhost:3000/v3");
    }
}
