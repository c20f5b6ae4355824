//! Endpoint service wrapper with observability.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::{EndpointProvider, EndpointSpec, EndpointStatus, EndpointSummary, TRACING_TARGET};
use crate::Result;

/// Endpoint service wrapper with observability.
///
/// This wrapper adds structured logging to any serving backend.
/// The inner provider is wrapped in `Arc` for cheap cloning.
#[derive(Clone)]
pub struct EndpointService {
    inner: Arc<dyn EndpointProvider>,
}

impl fmt::Debug for EndpointService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointService").finish_non_exhaustive()
    }
}

impl EndpointService {
    /// Create a new endpoint service wrapper.
    pub fn new<P>(provider: P) -> Self
    where
        P: EndpointProvider + 'static,
    {
        Self {
            inner: Arc::new(provider),
        }
    }

    /// Starts provisioning an endpoint.
    pub async fn create_endpoint(&self, spec: &EndpointSpec) -> Result<String> {
        tracing::debug!(
            target: TRACING_TARGET,
            endpoint = %spec.name,
            artifact = %spec.artifact_location,
            instance_type = %spec.instance_type,
            "Creating endpoint"
        );

        let result = self.inner.create_endpoint(spec).await;
        if let Err(error) = &result {
            tracing::error!(
                target: TRACING_TARGET,
                endpoint = %spec.name,
                error = %error,
                "Endpoint creation failed"
            );
        }

        result
    }

    /// Returns the current status of an endpoint.
    pub async fn get_status(&self, endpoint: &str) -> Result<EndpointStatus> {
        let result = self.inner.get_status(endpoint).await;

        match &result {
            Ok(status) => tracing::debug!(
                target: TRACING_TARGET,
                endpoint = %endpoint,
                state = %status.state,
                "Endpoint status"
            ),
            Err(error) => tracing::warn!(
                target: TRACING_TARGET,
                endpoint = %endpoint,
                error = %error,
                retryable = error.is_retryable(),
                "Endpoint status request failed"
            ),
        }

        result
    }

    /// Lists known endpoints.
    pub async fn list_endpoints(&self) -> Result<Vec<EndpointSummary>> {
        self.inner.list_endpoints().await
    }

    /// Sends one prediction request to an endpoint.
    pub async fn invoke(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let started_at = Instant::now();
        let result = self.inner.invoke(endpoint, payload).await;

        match &result {
            Ok(_) => tracing::trace!(
                target: TRACING_TARGET,
                endpoint = %endpoint,
                elapsed_ms = started_at.elapsed().as_millis(),
                "Endpoint invoked"
            ),
            Err(error) => tracing::warn!(
                target: TRACING_TARGET,
                endpoint = %endpoint,
                error = %error,
                elapsed_ms = started_at.elapsed().as_millis(),
                "Endpoint invocation failed"
            ),
        }

        result
    }

    /// Deletes an endpoint.
    pub async fn delete_endpoint(&self, endpoint: &str) -> Result<()> {
        let result = self.inner.delete_endpoint(endpoint).await;

        match &result {
            Ok(()) => tracing::info!(
                target: TRACING_TARGET,
                endpoint = %endpoint,
                "Endpoint deleted"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                endpoint = %endpoint,
                error = %error,
                "Endpoint deletion failed"
            ),
        }

        result
    }
}
