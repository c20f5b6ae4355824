//! Control-plane HTTP client.

use std::sync::Arc;
use std::time::Instant;

use modelgate_core::endpoint::EndpointService;
use modelgate_core::training::TrainingService;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ControlPlaneConfig;
use crate::error::{Error, Result};

/// Tracing target for control-plane requests.
pub const TRACING_TARGET: &str = "modelgate_reqwest::client";

/// Response bodies longer than this are truncated in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Inner client that holds the HTTP client and configuration.
struct ControlPlaneClientInner {
    http: Client,
    config: ControlPlaneConfig,
}

impl std::fmt::Debug for ControlPlaneClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneClientInner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// HTTP client for the training and serving control plane.
///
/// One client implements both [`TrainingProvider`] and [`EndpointProvider`];
/// clones share the connection pool.
///
/// [`TrainingProvider`]: modelgate_core::training::TrainingProvider
/// [`EndpointProvider`]: modelgate_core::endpoint::EndpointProvider
#[derive(Clone, Debug)]
pub struct ControlPlaneClient {
    inner: Arc<ControlPlaneClientInner>,
}

impl ControlPlaneClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry paths or the HTTP client
    /// cannot be created.
    pub fn new(config: ControlPlaneConfig) -> Result<Self> {
        let timeout = config.effective_timeout();

        tracing::debug!(
            target: TRACING_TARGET,
            api_url = %config.api_url,
            timeout_ms = timeout.as_millis(),
            authenticated = config.api_token.is_some(),
            "Creating control-plane client"
        );

        if config.api_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(config.api_url.to_string()));
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent())
            .build()?;

        let inner = ControlPlaneClientInner { http, config };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &ControlPlaneConfig {
        &self.inner.config
    }

    /// Converts a clone of this client into a [`TrainingService`].
    pub fn training_service(&self) -> TrainingService {
        TrainingService::new(self.clone())
    }

    /// Converts a clone of this client into an [`EndpointService`].
    pub fn endpoint_service(&self) -> EndpointService {
        EndpointService::new(self.clone())
    }

    /// Builds a request URL from percent-encoded path segments.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.config.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(self.inner.config.api_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Starts a request with authentication applied.
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.inner.http.request(method, url);
        match &self.inner.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends a request and checks the response status.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let started_at = Instant::now();
        let response = request.send().await?;
        let status = response.status();

        tracing::trace!(
            target: TRACING_TARGET,
            url = %response.url(),
            status = status.as_u16(),
            elapsed_ms = started_at.elapsed().as_millis(),
            "Control-plane response"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message: String = body.chars().take(MAX_ERROR_BODY).collect();
        Err(Error::Status { status, message })
    }

    /// Sends a request and decodes the JSON response body.
    pub(crate) async fn send_json<T>(&self, request: RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
