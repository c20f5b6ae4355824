//! Configuration for the control-plane client.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

/// Default timeout for HTTP requests: 30 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default control-plane base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/";

/// Configuration for the control-plane HTTP client.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ControlPlaneConfig {
    /// Base URL of the training and serving control plane
    #[cfg_attr(
        feature = "config",
        arg(long = "api-url", env = "MODELGATE_API_URL", default_value = DEFAULT_BASE_URL)
    )]
    #[serde(default = "default_base_url")]
    pub api_url: Url,

    /// Bearer token sent with every request
    #[cfg_attr(
        feature = "config",
        arg(long = "api-token", env = "MODELGATE_API_TOKEN", hide_env_values = true)
    )]
    #[serde(default)]
    pub api_token: Option<String>,

    /// HTTP request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "api-timeout", env = "MODELGATE_API_TIMEOUT", default_value = "30")
    )]
    #[serde(default = "default_timeout_secs")]
    pub api_timeout: u64,
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl std::fmt::Debug for ControlPlaneConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("api_timeout", &self.api_timeout)
            .finish()
    }
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            api_url: default_base_url(),
            api_token: None,
            api_timeout: default_timeout_secs(),
        }
    }
}

impl ControlPlaneConfig {
    /// Creates a configuration for the given base URL.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            ..Self::default()
        }
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.api_timeout = timeout_secs;
        self
    }

    /// Returns the effective timeout, using the default if zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.api_timeout == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.api_timeout)
        }
    }

    /// Returns the user agent sent with every request.
    pub fn user_agent(&self) -> String {
        format!("modelgate/{}", env!("CARGO_PKG_VERSION"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ControlPlaneConfig::default();
        assert_eq!(config.api_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.effective_timeout(), Duration::from_secs(30));
        assert!(config.user_agent().starts_with("modelgate/"));
    }

    #[test]
    fn test_zero_timeout_uses_default() {
        let config = ControlPlaneConfig::default().with_timeout(0);
        assert_eq!(
            config.effective_timeout(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let config = ControlPlaneConfig::default().with_token("s3cr3t");
        assert!(!format!("{config:?}").contains("s3cr3t"));
    }
}
