//! Endpoint service over HTTP.

use modelgate_core::endpoint::{EndpointProvider, EndpointSpec, EndpointStatus, EndpointSummary};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::client::ControlPlaneClient;

/// Body returned by `POST /endpoints`.
#[derive(Debug, Deserialize)]
struct CreateResponse {
    name: String,
}

/// Body returned by `GET /endpoints`.
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    endpoints: Vec<EndpointSummary>,
}

#[async_trait::async_trait]
impl EndpointProvider for ControlPlaneClient {
    async fn create_endpoint(&self, spec: &EndpointSpec) -> modelgate_core::Result<String> {
        let url = self.url(&["endpoints"])?;
        let response: CreateResponse = self
            .send_json(self.request(Method::POST, url).json(spec))
            .await?;
        Ok(response.name)
    }

    async fn get_status(&self, endpoint: &str) -> modelgate_core::Result<EndpointStatus> {
        let url = self.url(&["endpoints", endpoint])?;
        Ok(self.send_json(self.request(Method::GET, url)).await?)
    }

    async fn list_endpoints(&self) -> modelgate_core::Result<Vec<EndpointSummary>> {
        let url = self.url(&["endpoints"])?;
        let response: ListResponse = self.send_json(self.request(Method::GET, url)).await?;
        Ok(response.endpoints)
    }

    async fn invoke(&self, endpoint: &str, payload: &Value) -> modelgate_core::Result<Value> {
        let url = self.url(&["endpoints", endpoint, "invocations"])?;
        Ok(self
            .send_json(self.request(Method::POST, url).json(payload))
            .await?)
    }

    async fn delete_endpoint(&self, endpoint: &str) -> modelgate_core::Result<()> {
        let url = self.url(&["endpoints", endpoint])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}
