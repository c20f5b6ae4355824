//! Webhook sink implementation using reqwest.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use jiff::Timestamp;
use reqwest::Client;
use sha2::Sha256;
use url::Url;

use super::{Error, Result, TRACING_TARGET, WebhookConfig};
use crate::{Notification, NotificationSink};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the event name.
pub const EVENT_HEADER: &str = "X-Modelgate-Event";
/// Header carrying the signing timestamp in Unix seconds.
pub const TIMESTAMP_HEADER: &str = "X-Modelgate-Timestamp";
/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Modelgate-Signature";

struct WebhookSinkInner {
    http: Client,
    url: Url,
    config: WebhookConfig,
}

/// Sink that posts notifications to an HTTP endpoint.
///
/// The body is the JSON-serialized [`Notification`]. When a secret is
/// configured the body is signed with HMAC-SHA256 over
/// `{timestamp}.{body}` and sent as `sha256={hex}`.
#[derive(Clone)]
pub struct WebhookSink {
    inner: Arc<WebhookSinkInner>,
}

impl std::fmt::Debug for WebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSink")
            .field("url", &self.inner.url.as_str())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl WebhookSink {
    /// Creates a new webhook sink for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(url: Url, config: WebhookConfig) -> Result<Self> {
        let timeout = config.effective_timeout();

        tracing::debug!(
            target: TRACING_TARGET,
            url = %url,
            timeout_ms = timeout.as_millis(),
            signed = config.webhook_secret.is_some(),
            "Creating webhook sink"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent())
            .build()?;

        let inner = WebhookSinkInner { http, url, config };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Creates a sink from configuration, or `None` when no URL is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &WebhookConfig) -> Result<Option<Self>> {
        match &config.webhook_url {
            Some(url) => Self::new(url.clone(), config.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Signs a payload using HMAC-SHA256.
    ///
    /// The signature is computed over: `{timestamp}.{payload}`
    ///
    /// # Errors
    ///
    /// Returns an error if the key is rejected.
    pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| Error::InvalidKey)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let timestamp = Timestamp::now().as_second();
        let body = serde_json::to_vec(notification)?;

        let mut request = self
            .inner
            .http
            .post(self.inner.url.as_str())
            .header("Content-Type", "application/json")
            .header(EVENT_HEADER, &notification.event)
            .header(TIMESTAMP_HEADER, timestamp.to_string());

        if let Some(secret) = &self.inner.config.webhook_secret {
            let signature = Self::sign_payload(secret, timestamp, &body)?;
            request = request.header(SIGNATURE_HEADER, format!("sha256={signature}"));
        }

        let response = request.body(body).send().await?;
        let status = response.status();

        tracing::debug!(
            target: TRACING_TARGET,
            notification_id = %notification.id,
            status_code = status.as_u16(),
            "Webhook delivery completed"
        );

        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> crate::Result<()> {
        self.deliver(notification).await.map_err(Into::into)
    }
}
