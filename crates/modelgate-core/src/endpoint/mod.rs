//! Serving endpoint service abstraction.
//!
//! Endpoints are addressed by their unique name. Creation is asynchronous on
//! the service side: `create_endpoint` returns as soon as provisioning has
//! started and callers poll [`EndpointService::get_status`] until the
//! endpoint settles.

mod service;
mod types;

pub use service::EndpointService;
pub use types::{EndpointSpec, EndpointState, EndpointStatus, EndpointSummary};

use crate::Result;

/// Tracing target for endpoint service operations.
pub const TRACING_TARGET: &str = "modelgate_core::endpoint";

/// Core trait for serving endpoint implementations.
#[async_trait::async_trait]
pub trait EndpointProvider: Send + Sync {
    /// Starts provisioning an endpoint and returns its identifier.
    async fn create_endpoint(&self, spec: &EndpointSpec) -> Result<String>;

    /// Returns the current status of an endpoint.
    async fn get_status(&self, endpoint: &str) -> Result<EndpointStatus>;

    /// Lists known endpoints.
    async fn list_endpoints(&self) -> Result<Vec<EndpointSummary>>;

    /// Sends one prediction request to an endpoint.
    async fn invoke(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Deletes an endpoint.
    async fn delete_endpoint(&self, endpoint: &str) -> Result<()>;
}
