//! Webhook sink configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

/// Default timeout for webhook requests: 10 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the webhook sink.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct WebhookConfig {
    /// Endpoint notifications are posted to; no webhook is sent when unset
    #[cfg_attr(feature = "config", arg(long = "webhook-url", env = "WEBHOOK_URL"))]
    #[serde(default)]
    pub webhook_url: Option<Url>,

    /// Shared secret used to sign webhook payloads
    #[cfg_attr(
        feature = "config",
        arg(long = "webhook-secret", env = "WEBHOOK_SECRET", hide_env_values = true)
    )]
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Webhook request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "webhook-timeout", env = "WEBHOOK_TIMEOUT", default_value = "10")
    )]
    #[serde(default = "default_timeout_secs")]
    pub webhook_timeout: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("webhook_url", &self.webhook_url.as_ref().map(Url::as_str))
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .field("webhook_timeout", &self.webhook_timeout)
            .finish()
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_secret: None,
            webhook_timeout: default_timeout_secs(),
        }
    }
}

impl WebhookConfig {
    /// Returns the effective timeout, using the default if zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.webhook_timeout == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.webhook_timeout)
        }
    }

    /// Returns the user agent sent with webhook requests.
    pub fn user_agent(&self) -> String {
        format!("modelgate/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Sets the endpoint URL.
    #[must_use]
    pub fn with_url(mut self, url: Url) -> Self {
        self.webhook_url = Some(url);
        self
    }

    /// Sets the signing secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.webhook_timeout = timeout_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WebhookConfig::default();
        assert!(config.webhook_url.is_none());
        assert_eq!(config.effective_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_timeout_uses_default() {
        let config = WebhookConfig::default().with_timeout(0);
        assert_eq!(
            config.effective_timeout(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = WebhookConfig::default().with_secret("hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
