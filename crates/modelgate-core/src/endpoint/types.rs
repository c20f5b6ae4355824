//! Serving endpoint types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Lifecycle state of a serving endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EndpointState {
    /// Being provisioned.
    Creating,
    /// Being updated to a new configuration.
    Updating,
    /// Serving requests.
    InService,
    /// Provisioning or serving failed.
    Failed,
    /// Being torn down.
    Deleting,
}

impl EndpointState {
    /// Returns whether polling can stop on this state.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::InService | Self::Failed)
    }
}

/// Parameters for provisioning a new endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Unique endpoint name.
    pub name: String,
    /// Location of the model artifact to serve.
    pub artifact_location: String,
    /// Compute instance type.
    pub instance_type: String,
}

impl EndpointSpec {
    /// Creates a new endpoint specification.
    pub fn new(
        name: impl Into<String>,
        artifact_location: impl Into<String>,
        instance_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            artifact_location: artifact_location.into(),
            instance_type: instance_type.into(),
        }
    }
}

/// Snapshot of a single endpoint as returned by `get_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatus {
    /// Endpoint name.
    pub name: String,
    /// Current lifecycle state.
    pub state: EndpointState,
    /// Failure reason reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl EndpointStatus {
    /// Creates a new status snapshot.
    pub fn new(name: impl Into<String>, state: EndpointState) -> Self {
        Self {
            name: name.into(),
            state,
            failure_reason: None,
        }
    }

    /// Sets the failure reason.
    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

/// Listing entry for an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    /// Endpoint name.
    pub name: String,
    /// Current lifecycle state.
    pub state: EndpointState,
    /// Creation time.
    pub created_at: Timestamp,
}

impl EndpointSummary {
    /// Creates a new listing entry.
    pub fn new(name: impl Into<String>, state: EndpointState, created_at: Timestamp) -> Self {
        Self {
            name: name.into(),
            state,
            created_at,
        }
    }
}
